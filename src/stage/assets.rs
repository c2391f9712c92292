use std::sync::Arc;

use camino::Utf8PathBuf;

use crate::error::TaskResult;
use crate::stage::{StageContext, run_stage};

/// Copy every configured asset, file or directory, to its mirrored
/// location in the output root.
pub(crate) async fn copy_assets(ctx: Arc<StageContext>, verbose: bool) -> TaskResult {
    let assets = ctx
        .config
        .assets()
        .iter()
        .map(|asset| ctx.config.source().join(asset))
        .collect();

    run_stage("Copy Assets", assets, |path| {
        copy_asset(ctx.clone(), path, verbose)
    })
    .await?;

    Ok(())
}

async fn copy_asset(ctx: Arc<StageContext>, path: Utf8PathBuf, verbose: bool) -> TaskResult {
    let target = ctx.config.output_path(&path);

    if verbose {
        tracing::info!(from = %path, to = %target, "copy asset");
    }

    ctx.writer.copy(&path, &target).await?;
    Ok(())
}
