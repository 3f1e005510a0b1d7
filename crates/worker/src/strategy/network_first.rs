//! Network first, cache second, offline document last.

use offgrid_core::{Error, PartitionKind, ProxyRequest, ProxyResponse};

use super::StrategyContext;

pub async fn network_first(ctx: &StrategyContext, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
    let err = match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            ctx.store(PartitionKind::Dynamic, request, &response);
            return Ok(response);
        }
        Err(err) => err,
    };

    tracing::debug!(url = %request.url, error = %err, "network failed, falling back to cache");

    if let Some(cached) = ctx.lookup(request).await {
        return Ok(cached);
    }

    if request.is_navigation() {
        return Ok(ctx.offline_fallback().await);
    }

    Err(err)
}
