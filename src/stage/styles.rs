use std::sync::Arc;

use camino::Utf8PathBuf;

use crate::artifact::FileArtifact;
use crate::error::{BuildError, TaskResult};
use crate::stage::{STYLE_GLOB, StageContext, run_stage};
use crate::tools::FileKind;

pub(crate) async fn build_styles(ctx: Arc<StageContext>) -> TaskResult {
    let files = ctx.files(STYLE_GLOB)?;

    run_stage("Build CSS", files, |path| write_style(ctx.clone(), path)).await?;

    Ok(())
}

async fn write_style(ctx: Arc<StageContext>, path: Utf8PathBuf) -> TaskResult {
    let artifact = build_style(&ctx, path).await?;
    ctx.writer.write(artifact).await?;
    Ok(())
}

/// Minify a stylesheet and put the header on top.
async fn build_style(ctx: &StageContext, path: Utf8PathBuf) -> Result<FileArtifact, BuildError> {
    let css = ctx.tools.fs.read_to_string(&path).await?;
    let minified = ctx.tools.styles.minify(&css)?;
    let content = ctx.headers.apply_header(minified, FileKind::Style)?;

    Ok(FileArtifact {
        output_path: ctx.config.output_path(&path),
        source_path: path,
        content,
        source_map: None,
    })
}
