#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod artifact;
mod config;
mod error;
mod ignore;
mod planner;
mod queue;
mod report;
mod stage;
pub mod template;
pub mod tools;
mod utils;

use std::sync::Arc;
use std::time::Instant;

use camino::Utf8Path;
use console::style;

pub use crate::artifact::{ArtifactWriter, FileArtifact, HeaderPolicy, MapArtifact, PRESERVE};
pub use crate::config::{BuildConfig, PackageMetadata, RawConfig, resolve_config};
pub use crate::error::*;
pub use crate::ignore::IgnoreMatcher;
pub use crate::planner::{BuildStagePlanner, Stage};
pub use crate::queue::{Next, QueueState, Task, TaskFuture, TaskQueue};
pub use crate::report::Report;
pub use crate::stage::{ScriptOptions, StageContext, build_script, run_stage};
pub use crate::template::TemplateContext;

use crate::tools::{Minified, MinifyOptions, Source, SourceMapRef, Toolchain, TranspileOptions, Transpiled};

/// Entry point of a build.
///
/// A `Builder` owns the resolved configuration, the package metadata, the
/// collaborators and the stage plan. Nothing happens until [`Builder::run`],
/// which materializes the root [`TaskQueue`] and drives it to completion.
///
/// ```rust,no_run
/// use assetline::Builder;
///
/// fn main() -> Result<(), assetline::BuildError> {
///     let builder = Builder::from_files(Some("assetline.json"), "package.json")?;
///     builder.run_blocking()
/// }
/// ```
#[derive(Debug)]
pub struct Builder {
    config: Arc<BuildConfig>,
    package: PackageMetadata,
    tools: Toolchain,
    planner: BuildStagePlanner,
}

impl Builder {
    /// Builder running the standard stages.
    pub fn new(config: BuildConfig, package: PackageMetadata, tools: Toolchain) -> Self {
        Self {
            config: Arc::new(config),
            package,
            tools,
            planner: BuildStagePlanner::standard(),
        }
    }

    /// Read the build configuration (optional) and `package.json`, and set
    /// up the standard toolchain.
    pub fn from_files(
        config: Option<impl AsRef<Utf8Path>>,
        package: impl AsRef<Utf8Path>,
    ) -> Result<Self, BuildError> {
        let raw = match config {
            Some(path) => RawConfig::from_file(path)?,
            None => RawConfig::default(),
        };

        let package = PackageMetadata::from_file(package)?;
        let config = resolve_config(raw, &package)?;
        let tools = Toolchain::standard(&package);

        Ok(Self::new(config, package, tools))
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn package(&self) -> &PackageMetadata {
        &self.package
    }

    pub fn sourcemap_url(&self) -> Option<&str> {
        self.config.sourcemap_url()
    }

    /// Override the resolved sourcemap root. `None` or an empty value
    /// disables source maps.
    pub fn set_sourcemap_url(&mut self, url: Option<String>) {
        let config = BuildConfig::clone(&self.config).with_sourcemap_url(url);
        self.config = Arc::new(config);
    }

    /// Replace the stage plan.
    pub fn with_planner(mut self, planner: BuildStagePlanner) -> Self {
        self.planner = planner;
        self
    }

    /// Go back to the standard stage plan.
    pub fn make(&mut self) {
        self.planner = BuildStagePlanner::standard();
    }

    pub fn planner(&self) -> &BuildStagePlanner {
        &self.planner
    }

    /// Transpile a single file or a piece of code with the configured
    /// transpiler options. A map is requested only when a sourcemap root
    /// is configured.
    pub async fn transpile(&self, source: Source) -> Result<Transpiled, BuildError> {
        let code = self.tools.load(&source).await?;
        let file_name = match &source {
            Source::FilePath(path) => path.file_name().unwrap_or_default(),
            Source::RawCode(_) => "",
        };

        let options = TranspileOptions {
            file_name,
            source_maps: self.config.sourcemap_url().is_some(),
            extra: self.config.transpile(),
        };

        Ok(self.tools.transpiler.transpile(&code, &options).await?)
    }

    /// Minify a single file or a piece of code. `file_name` is the output
    /// name relative to the output root, a map is produced for it when a
    /// sourcemap root is configured.
    pub async fn minify(
        &self,
        source: Source,
        file_name: Option<&str>,
        prior_map: Option<String>,
    ) -> Result<Minified, BuildError> {
        let code = self.tools.load(&source).await?;

        let source_map = match (self.config.sourcemap_url(), file_name) {
            (Some(url), Some(name)) => Some(SourceMapRef::new(url, name)),
            _ => None,
        };

        let options = MinifyOptions {
            file_name: file_name.map(String::from),
            prior_map,
            source_map,
        };

        Ok(self.tools.minifier.minify(&code, &options).await?)
    }

    /// Run every planned stage in order.
    pub async fn run(self) -> Result<(), BuildError> {
        eprintln!("{}", Report::new(&self.config, &self.package));

        let s = Instant::now();
        let ctx = Arc::new(StageContext::new(self.config, self.tools));
        let queue = self.planner.into_queue(ctx)?;

        queue.on_complete(move || {
            eprintln!(
                "{} {}",
                style("Build complete").green(),
                crate::utils::as_overhead(s)
            );
        });

        queue.run().await?;

        Ok(())
    }

    /// Run the build on a fresh current-thread runtime.
    pub fn run_blocking(self) -> Result<(), BuildError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(BuildError::Runtime)?
            .block_on(self.run())
    }
}
