//! Strategy executors.
//!
//! Each strategy resolves an intercepted request from the cache, the network
//! or a synthetic fallback. Cache writes are spawned as background tasks and
//! never gate the response; a failed write is logged and forgotten.

pub mod cache_first;
pub mod module_fetch;
pub mod network_first;
pub mod stale_while_revalidate;

use std::sync::{Arc, Mutex, PoisonError};

use offgrid_core::{CacheDb, Error, Fetcher, Generation, PartitionKind, ProxyRequest, ProxyResponse};
use tokio::task::JoinHandle;
use url::Url;

use crate::classifier::{Classifier, Strategy};

pub use cache_first::cache_first;
pub use module_fetch::module_fetch;
pub use network_first::network_first;
pub use stale_while_revalidate::stale_while_revalidate;

/// Tracks fire-and-forget tasks so they can be awaited at shutdown.
///
/// Dropping the tracker detaches the tasks; they still run to completion.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    pub fn track(&self, handle: JoinHandle<()>) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Spawn a best-effort write of `response` under `request`.
    pub fn spawn_put(&self, cache: CacheDb, partition: String, request: ProxyRequest, response: ProxyResponse) {
        self.track(tokio::spawn(async move {
            match cache.put(&partition, &request, &response).await {
                Ok(()) => tracing::debug!(partition = %partition, url = %request.url, "stored response"),
                Err(e) => tracing::warn!(partition = %partition, url = %request.url, error = %e, "cache write failed"),
            }
        }));
    }

    /// Wait for every tracked task, including tasks spawned while waiting.
    pub async fn flush(&self) {
        loop {
            let batch = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
            if batch.is_empty() {
                return;
            }
            for handle in batch {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "background task aborted");
                }
            }
        }
    }
}

/// Everything a strategy needs to resolve a request.
#[derive(Clone)]
pub struct StrategyContext {
    pub cache: CacheDb,
    pub fetcher: Arc<dyn Fetcher>,
    pub generation: Generation,
    pub classifier: Arc<Classifier>,
    /// Root document served to navigations when offline.
    pub offline_document: Url,
    /// Hosts that stale-while-revalidate never revalidates.
    pub swr_bypass_domains: Arc<Vec<String>>,
    pub background: BackgroundTasks,
}

impl StrategyContext {
    pub async fn execute(&self, strategy: Strategy, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        match strategy {
            Strategy::NetworkFirst => network_first(self, request).await,
            Strategy::CacheFirst => cache_first(self, request).await,
            Strategy::StaleWhileRevalidate => stale_while_revalidate(self, request).await,
            Strategy::ModuleFetch => module_fetch(self, request).await,
        }
    }

    /// Look the request up in this generation's partitions.
    ///
    /// Read failures are treated as misses.
    pub async fn lookup(&self, request: &ProxyRequest) -> Option<ProxyResponse> {
        match self.cache.match_any(&self.generation.partitions(), request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed");
                None
            }
        }
    }

    /// Best-effort write into one of this generation's partitions.
    pub fn store(&self, kind: PartitionKind, request: &ProxyRequest, response: &ProxyResponse) {
        if !response.is_cacheable() || !self.classifier.is_eligible(request) {
            return;
        }
        self.background.spawn_put(
            self.cache.clone(),
            self.generation.partition(kind),
            request.clone(),
            response.clone(),
        );
    }

    /// Cached root document, or a synthetic `503 Offline`.
    pub async fn offline_fallback(&self) -> ProxyResponse {
        let root = ProxyRequest::navigate(self.offline_document.clone());
        match self.lookup(&root).await {
            Some(cached) => cached,
            None => ProxyResponse::offline(),
        }
    }
}
