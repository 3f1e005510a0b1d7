//! Cache first; the network is only consulted on a miss.

use offgrid_core::{Error, PartitionKind, ProxyRequest, ProxyResponse};

use super::StrategyContext;

/// Static assets are precached at install, so a failed fetch on a miss has no
/// further fallback.
pub async fn cache_first(ctx: &StrategyContext, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
    if let Some(cached) = ctx.lookup(request).await {
        tracing::debug!(url = %request.url, "cache hit");
        return Ok(cached);
    }

    let response = ctx.fetcher.fetch(request).await?;
    ctx.store(PartitionKind::Static, request, &response);
    Ok(response)
}
