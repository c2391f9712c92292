//! Build stages and the fan-out/join primitive they share.
mod assets;
mod clean;
mod markup;
mod scripts;
mod styles;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use camino::Utf8PathBuf;
use tokio::task::JoinSet;
use tracing::Instrument;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::artifact::{ArtifactWriter, HeaderPolicy};
use crate::config::BuildConfig;
use crate::error::{FileFailure, StageError, TaskResult, WalkError};
use crate::tools::Toolchain;

pub use scripts::{ScriptOptions, build_script};

pub(crate) use assets::copy_assets;
pub(crate) use clean::clean;
pub(crate) use markup::build_markup;
pub(crate) use scripts::build_scripts;
pub(crate) use styles::build_styles;

pub const MARKUP_GLOB: &str = "**/*.htm*";
pub const SCRIPT_GLOB: &str = "**/*.js";
pub const STYLE_GLOB: &str = "**/*.css";

/// Everything a stage action can read. Shared by all sibling tasks and never
/// mutated while the build runs.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub config: Arc<BuildConfig>,
    pub tools: Toolchain,
    pub writer: ArtifactWriter,
    pub headers: HeaderPolicy,
}

impl StageContext {
    pub fn new(config: Arc<BuildConfig>, tools: Toolchain) -> Self {
        let headers = HeaderPolicy::new(
            config.header().map(String::from),
            config.footer().map(String::from),
            config.sourcemap_url().is_some(),
            tools.header.clone(),
        );

        Self {
            writer: ArtifactWriter::new(tools.fs.clone()),
            headers,
            config,
            tools,
        }
    }

    /// Source files matching `pattern`, minus the walk-ignore list.
    pub fn files(&self, pattern: &str) -> Result<Vec<Utf8PathBuf>, WalkError> {
        let found = self.tools.fs.walk(&self.config.source_glob(pattern))?;

        Ok(found
            .into_iter()
            .filter(|path| !self.config.ignore().is_ignored(path))
            .collect())
    }
}

/// Run `action` once per path, all issued at once, and wait for every one
/// of them before returning.
///
/// Siblings are never cancelled: when some fail, the others still run to
/// completion, and the error lists the failures in issue order. Returns the
/// number of files processed. An empty list completes immediately.
pub async fn run_stage<F, Fut>(
    stage: &str,
    paths: Vec<Utf8PathBuf>,
    action: F,
) -> Result<usize, StageError>
where
    F: Fn(Utf8PathBuf) -> Fut,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    if paths.is_empty() {
        tracing::debug!(stage, "no matching files");
        return Ok(0);
    }

    let span = tracing::info_span!("stage", name = stage);
    span.pb_set_style(&crate::utils::STAGE_STYLE);
    span.pb_set_length(paths.len() as u64);
    span.pb_set_message(stage);

    let s = Instant::now();
    let total = paths.len();

    let failures = async {
        let mut set = JoinSet::new();
        let mut issued = HashMap::new();

        for (index, path) in paths.iter().enumerate() {
            let future = action(path.clone()).in_current_span();
            let handle = set.spawn(future);
            issued.insert(handle.id(), index);
        }

        let mut failures = Vec::new();

        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(error))) => failures.push((issued[&id], error)),
                Err(err) => {
                    let index = issued[&err.id()];
                    failures.push((index, anyhow::anyhow!("task panicked: {err}")));
                }
            }

            tracing::Span::current().pb_inc(1);
        }

        failures
    }
    .instrument(span)
    .await;

    if failures.is_empty() {
        tracing::info!(stage, files = total, "finished {}", crate::utils::as_overhead(s));
        return Ok(total);
    }

    let mut failures: Vec<_> = failures
        .into_iter()
        .map(|(index, error)| (index, FileFailure {
            path: paths[index].clone(),
            error,
        }))
        .collect();
    failures.sort_by_key(|(index, _)| *index);

    for (_, failure) in &failures {
        tracing::error!(stage, file = %failure.path, "{:#}", failure.error);
    }

    Err(StageError {
        stage: stage.to_string(),
        failures: failures.into_iter().map(|(_, failure)| failure).collect(),
    })
}
