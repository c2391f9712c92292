use std::sync::Arc;

use camino::Utf8PathBuf;
use tracing::Instrument;

use crate::artifact::{FileArtifact, MapArtifact};
use crate::error::{BuildError, TaskResult};
use crate::stage::{SCRIPT_GLOB, StageContext, run_stage};
use crate::tools::{FileKind, MinifyOptions, SourceMapRef, TranspileOptions};

/// Which steps of the script pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptOptions {
    pub transpile: bool,
    pub minify: bool,
    /// Global toggle, maps are only emitted when a sourcemap root is set too.
    pub sourcemaps: bool,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            transpile: true,
            minify: true,
            sourcemaps: true,
        }
    }
}

pub(crate) async fn build_scripts(ctx: Arc<StageContext>, opts: ScriptOptions) -> TaskResult {
    let files = ctx.files(SCRIPT_GLOB)?;

    run_stage("Build JavaScript", files, |path| {
        write_script(ctx.clone(), path, opts)
    })
    .await?;

    Ok(())
}

async fn write_script(ctx: Arc<StageContext>, path: Utf8PathBuf, opts: ScriptOptions) -> TaskResult {
    let span = tracing::debug_span!("script", file = %path);
    let artifact = build_script(&ctx, path, opts).instrument(span).await?;
    ctx.writer.write(artifact).await?;
    Ok(())
}

/// Build a single script into an artifact, without writing anything.
///
/// The file is read, transpiled and minified, then decorated with the
/// configured header and footer. A source map is attached only when maps
/// are enabled, a sourcemap root is configured and the file is not matched
/// by `ignoremaps`.
pub async fn build_script(
    ctx: &StageContext,
    path: Utf8PathBuf,
    opts: ScriptOptions,
) -> Result<FileArtifact, BuildError> {
    let config = &ctx.config;
    let local = config.local_path(&path);
    let url = config.sourcemap_url().filter(|_| opts.sourcemaps);

    let mut code = ctx.tools.fs.read_to_string(&path).await?;
    let mut map = None;

    if opts.transpile {
        let options = TranspileOptions {
            file_name: path.file_name().unwrap_or_default(),
            source_maps: url.is_some(),
            extra: config.transpile(),
        };

        let transpiled = ctx.tools.transpiler.transpile(&code, &options).await?;
        code = transpiled.code;
        map = transpiled.map;
    }

    let reference = match url {
        Some(url) => match config.ignore_maps().matched(&path) {
            Some(pattern) => {
                tracing::warn!(
                    file = %local,
                    pattern,
                    "skipped sourcemap creation (explicitly ignored)"
                );
                None
            }
            None => Some(SourceMapRef::new(url, local.as_str())),
        },
        None => None,
    };

    if reference.is_none() {
        map = None;
    }

    if opts.minify {
        let options = MinifyOptions {
            file_name: Some(local.to_string()),
            prior_map: map.take(),
            source_map: reference.clone(),
        };

        let minified = ctx.tools.minifier.minify(&code, &options).await?;
        code = minified.code;
        map = minified.map.filter(|_| reference.is_some());
    }

    let code = ctx.headers.apply_header(code, FileKind::Script)?;
    let content = ctx.headers.apply_footer(code, FileKind::Script)?;

    let source_map = match map {
        Some(contents) => {
            let map_path = config.sourcemap_path(&path);
            tracing::info!(file = %local, map = %map_path, "sourcemap created");
            Some(MapArtifact {
                path: map_path,
                contents,
            })
        }
        None => None,
    };

    Ok(FileArtifact {
        output_path: config.output_path(&path),
        source_path: path,
        content,
        source_map,
    })
}
