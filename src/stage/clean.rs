use std::sync::Arc;
use std::time::Instant;

use crate::error::TaskResult;
use crate::stage::StageContext;

/// Make sure the output root exists and is empty.
pub(crate) async fn clean(ctx: Arc<StageContext>) -> TaskResult {
    let s = Instant::now();
    let output = ctx.config.output();

    ctx.tools.fs.empty_dir(output).await?;

    tracing::info!(
        output = %output,
        "cleaned the output directory {}",
        crate::utils::as_overhead(s)
    );

    Ok(())
}
