//! Serve from cache immediately, refresh in the background.

use offgrid_core::{Error, PartitionKind, ProxyRequest, ProxyResponse};
use tokio::sync::oneshot;

use super::StrategyContext;

pub async fn stale_while_revalidate(ctx: &StrategyContext, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
    let cached = ctx.lookup(request).await;

    if bypasses_revalidation(ctx, request) {
        tracing::debug!(url = %request.url, "revalidation bypassed for host");
        return Ok(cached.unwrap_or_else(ProxyResponse::placeholder));
    }

    let revalidation = spawn_revalidation(ctx, request.revalidation());

    if let Some(cached) = cached {
        return Ok(cached);
    }

    if let Ok(Some(fresh)) = revalidation.await {
        return Ok(fresh);
    }

    match ctx.fetcher.fetch(request).await {
        Ok(response) => Ok(response),
        Err(err) => {
            tracing::debug!(url = %request.url, error = %err, "cache and network both failed");
            if request.is_navigation() { Ok(ProxyResponse::offline()) } else { Ok(ProxyResponse::gateway_timeout()) }
        }
    }
}

fn bypasses_revalidation(ctx: &StrategyContext, request: &ProxyRequest) -> bool {
    let Some(host) = request.url.host_str() else {
        return false;
    };
    ctx.swr_bypass_domains.iter().any(|domain| {
        host.eq_ignore_ascii_case(domain)
            || host
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
    })
}

/// Start the background refresh. The receiver yields the fresh response, or
/// `None` if the network failed.
fn spawn_revalidation(ctx: &StrategyContext, request: ProxyRequest) -> oneshot::Receiver<Option<ProxyResponse>> {
    let (tx, rx) = oneshot::channel();
    let ctx_bg = ctx.clone();

    ctx.background.track(tokio::spawn(async move {
        let outcome = match ctx_bg.fetcher.fetch(&request).await {
            Ok(response) => {
                ctx_bg.store(PartitionKind::Dynamic, &request, &response);
                Some(response)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "revalidation failed");
                None
            }
        };
        let _ = tx.send(outcome);
    }));

    rx
}
