//! Composition of the build out of ordered stages.
use std::sync::Arc;

use crate::error::QueueError;
use crate::queue::TaskQueue;
use crate::stage::{self, ScriptOptions, StageContext};

/// One top-level phase of the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Ensure the output root exists and is empty.
    Clean,
    /// Copy the configured assets, optionally logging every copy.
    CopyAssets { verbose: bool },
    /// Copy markup unchanged.
    BuildMarkup,
    BuildScripts(ScriptOptions),
    BuildStyles,
}

impl Stage {
    /// Task name used in the root queue.
    pub fn name(&self, ctx: &StageContext) -> String {
        match self {
            Stage::Clean => format!("Cleaning {}", ctx.config.output()),
            Stage::CopyAssets { .. } => "Copy Assets".into(),
            Stage::BuildMarkup => "Build HTML".into(),
            Stage::BuildScripts(_) => "Build JavaScript".into(),
            Stage::BuildStyles => "Build CSS".into(),
        }
    }

    fn push(self, queue: &TaskQueue, ctx: Arc<StageContext>) -> Result<(), QueueError> {
        let name = self.name(&ctx);

        match self {
            Stage::Clean => queue.add(name, move || stage::clean(ctx))?,
            Stage::CopyAssets { verbose } => {
                queue.add(name, move || stage::copy_assets(ctx, verbose))?
            }
            Stage::BuildMarkup => queue.add(name, move || stage::build_markup(ctx))?,
            Stage::BuildScripts(opts) => {
                queue.add(name, move || stage::build_scripts(ctx, opts))?
            }
            Stage::BuildStyles => queue.add(name, move || stage::build_styles(ctx))?,
        };

        Ok(())
    }
}

/// Append-only list of stages turned into a root [`TaskQueue`].
///
/// The planner never reorders: stages run in the order they were added. A
/// caller wanting another pipeline starts from [`BuildStagePlanner::new`]
/// and appends what it needs.
///
/// ```rust
/// use assetline::{BuildStagePlanner, Stage};
///
/// let planner = BuildStagePlanner::new().clean().build_styles();
/// assert_eq!(planner.stages(), &[Stage::Clean, Stage::BuildStyles]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BuildStagePlanner {
    stages: Vec<Stage>,
}

impl BuildStagePlanner {
    /// An empty planner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clean, copy assets, markup, scripts and styles, in this order.
    pub fn standard() -> Self {
        Self::new()
            .clean()
            .copy_assets(false)
            .build_markup()
            .build_scripts(ScriptOptions::default())
            .build_styles()
    }

    pub fn clean(self) -> Self {
        self.push(Stage::Clean)
    }

    pub fn copy_assets(self, verbose: bool) -> Self {
        self.push(Stage::CopyAssets { verbose })
    }

    pub fn build_markup(self) -> Self {
        self.push(Stage::BuildMarkup)
    }

    pub fn build_scripts(self, opts: ScriptOptions) -> Self {
        self.push(Stage::BuildScripts(opts))
    }

    pub fn build_styles(self) -> Self {
        self.push(Stage::BuildStyles)
    }

    fn push(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Materialize the root queue, one task per stage.
    pub fn into_queue(self, ctx: Arc<StageContext>) -> Result<TaskQueue, QueueError> {
        let queue = TaskQueue::new("build");

        for stage in self.stages {
            stage.push(&queue, ctx.clone())?;
        }

        Ok(queue)
    }
}
