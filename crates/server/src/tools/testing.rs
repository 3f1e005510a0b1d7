//! Test doubles for tool tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use offgrid_client::{Coordinator, CoordinatorOptions};
use offgrid_core::config::AppConfig;
use offgrid_core::{CacheDb, Error, Fetcher, ProxyRequest, ProxyResponse};
use offgrid_worker::{FixedRelease, Release, Runtime, RuntimeOptions};
use rmcp::model::CallToolResult;
use url::Url;

use super::ProxyState;

/// Answers every URL on the app origin with its path as the body.
#[derive(Default)]
pub struct Origin {
    pub offline: AtomicBool,
}

impl Origin {
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Fetcher for Origin {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        if self.offline.load(Ordering::SeqCst) || request.url.host_str() != Some("app.example.com") {
            return Err(Error::Network(format!("unreachable: {}", request.url)));
        }
        Ok(ProxyResponse::new(200, "OK")
            .with_header("content-type", "text/plain")
            .with_body(request.url.path()))
    }
}

pub async fn state_with(config: AppConfig) -> (ProxyState, Arc<Origin>) {
    let cache = CacheDb::open_in_memory().await.unwrap();
    let origin = Arc::new(Origin::default());
    let release = Release::from_config(&config).unwrap();
    let runtime = Runtime::new(
        cache,
        origin.clone(),
        Arc::new(FixedRelease(release)),
        RuntimeOptions::from_config(&config).unwrap(),
    );
    let coordinator = Coordinator::new(runtime, CoordinatorOptions::from_config(&config));
    (ProxyState { coordinator, origin: Url::parse(&config.origin).unwrap() }, origin)
}

pub async fn state() -> (ProxyState, Arc<Origin>) {
    state_with(AppConfig { build_date: Some("2025-01-15".into()), ..Default::default() }).await
}

/// Parse the JSON text content of a tool result.
pub fn output(result: &CallToolResult) -> serde_json::Value {
    let text = result.content[0].as_text().unwrap().text.clone();
    serde_json::from_str(&text).unwrap()
}
