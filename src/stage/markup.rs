use std::sync::Arc;

use camino::Utf8PathBuf;

use crate::error::TaskResult;
use crate::stage::{MARKUP_GLOB, StageContext, run_stage};

/// Markup is copied into the output tree without any transformation.
pub(crate) async fn build_markup(ctx: Arc<StageContext>) -> TaskResult {
    let files = ctx.files(MARKUP_GLOB)?;

    run_stage("Build HTML", files, |path| copy_markup(ctx.clone(), path)).await?;

    Ok(())
}

async fn copy_markup(ctx: Arc<StageContext>, path: Utf8PathBuf) -> TaskResult {
    let target = ctx.config.output_path(&path);
    ctx.writer.copy(&path, &target).await?;
    Ok(())
}
