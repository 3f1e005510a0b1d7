//! Network-first handling for executable script modules.
//!
//! Edge servers sometimes label module scripts `text/plain` or
//! `application/octet-stream`, and a module with the wrong MIME type refuses
//! to execute. Every response leaving this handler carries the canonical
//! script content type.

use offgrid_core::exchange::JAVASCRIPT_CONTENT_TYPE;
use offgrid_core::{Error, PartitionKind, ProxyRequest, ProxyResponse};

use super::StrategyContext;

pub async fn module_fetch(ctx: &StrategyContext, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
    match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            let corrected = with_script_content_type(response);
            ctx.store(PartitionKind::Static, request, &corrected);
            Ok(corrected)
        }
        Err(err) => match ctx.lookup(request).await {
            Some(cached) => {
                tracing::debug!(url = %request.url, error = %err, "serving cached module");
                Ok(with_script_content_type(cached))
            }
            None => Err(err),
        },
    }
}

fn with_script_content_type(mut response: ProxyResponse) -> ProxyResponse {
    response.set_header("content-type", JAVASCRIPT_CONTENT_TYPE);
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use offgrid_core::{Destination, ResponseSource};

    use super::*;
    use crate::testing::{StubFetcher, context, ok, url};

    const ENTRY: &str = "https://app.example.com/assets/index-4f2a.js";

    fn script() -> ProxyRequest {
        ProxyRequest::get(url(ENTRY)).with_destination(Destination::Script)
    }

    #[tokio::test]
    async fn test_network_response_is_relabelled_and_stored() {
        let fetcher = Arc::new(StubFetcher::new().route(ENTRY, ok("export {}", "text/plain")));
        let ctx = context(fetcher).await;

        let res = module_fetch(&ctx, &script()).await.unwrap();
        assert_eq!(res.content_type(), Some(JAVASCRIPT_CONTENT_TYPE));
        assert_eq!(res.text(), "export {}");

        ctx.background.flush().await;
        let stored = ctx
            .cache
            .match_in(&ctx.generation.partition(PartitionKind::Static), &script())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.content_type(), Some(JAVASCRIPT_CONTENT_TYPE));
    }

    #[tokio::test]
    async fn test_prefers_network_over_cache() {
        let fetcher = Arc::new(StubFetcher::new().route(ENTRY, ok("new", "application/javascript")));
        let ctx = context(fetcher.clone()).await;
        ctx.cache
            .put(&ctx.generation.partition(PartitionKind::Static), &script(), &ok("old", "application/javascript"))
            .await
            .unwrap();

        let res = module_fetch(&ctx, &script()).await.unwrap();
        assert_eq!(res.text(), "new");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cached_fallback_is_relabelled() {
        let ctx = context(Arc::new(StubFetcher::new())).await;
        ctx.cache
            .put(
                &ctx.generation.partition(PartitionKind::Static),
                &script(),
                &ok("export {}", "application/octet-stream"),
            )
            .await
            .unwrap();

        let res = module_fetch(&ctx, &script()).await.unwrap();
        assert_eq!(res.source, ResponseSource::Cache);
        assert_eq!(res.content_type(), Some(JAVASCRIPT_CONTENT_TYPE));
    }

    #[tokio::test]
    async fn test_no_network_no_cache_propagates() {
        let ctx = context(Arc::new(StubFetcher::new())).await;
        assert!(matches!(module_fetch(&ctx, &script()).await, Err(Error::Network(_))));
    }
}
