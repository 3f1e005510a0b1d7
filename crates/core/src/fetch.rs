//! The network seam.
//!
//! Everything that leaves the process goes through a `Fetcher`. The worker and
//! the runtime only ever see this trait, so tests swap in stubs.

use crate::Error;
use crate::exchange::{ProxyRequest, ProxyResponse};

/// Performs a network request.
///
/// Resolves with any HTTP response, including error statuses; only failures
/// to obtain a response at all are errors.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error>;
}
