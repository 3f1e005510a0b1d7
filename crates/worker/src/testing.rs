//! Test doubles shared by the worker's unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use offgrid_core::config::AppConfig;
use offgrid_core::{CacheDb, Error, Fetcher, Generation, ProxyRequest, ProxyResponse};
use tokio::sync::Notify;
use url::Url;

use crate::classifier::Classifier;
use crate::release::{Release, ReleaseSource};
use crate::strategy::{BackgroundTasks, StrategyContext};

/// Scripted network: known URLs answer, everything else fails.
#[derive(Default)]
pub struct StubFetcher {
    routes: Mutex<HashMap<String, ProxyResponse>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<ProxyRequest>>,
    gate: Option<Arc<Notify>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch waits for `gate` to be notified before answering.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self { gate: Some(gate), ..Self::default() }
    }

    pub fn route(self, url: &str, response: ProxyResponse) -> Self {
        self.set_route(url, response);
        self
    }

    pub fn set_route(&self, url: &str, response: ProxyResponse) {
        let url = Url::parse(url).unwrap().to_string();
        self.routes.lock().unwrap().insert(url, response);
    }

    pub fn clear_routes(&self) {
        self.routes.lock().unwrap().clear();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<ProxyRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        route
            .map(|r| r.with_header("x-served-by", "network"))
            .ok_or_else(|| Error::Network(format!("unreachable: {}", request.url)))
    }
}

pub fn ok(body: &str, content_type: &str) -> ProxyResponse {
    ProxyResponse::new(200, "OK")
        .with_header("content-type", content_type)
        .with_body(body)
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn generation(date: &str) -> Generation {
    Generation::parse("app", date).unwrap()
}

pub async fn context(fetcher: Arc<StubFetcher>) -> StrategyContext {
    let cache = CacheDb::open_in_memory().await.unwrap();
    context_with(cache, fetcher, generation("2025-01-15"))
}

pub fn context_with(cache: CacheDb, fetcher: Arc<StubFetcher>, generation: Generation) -> StrategyContext {
    let config = AppConfig::default();
    StrategyContext {
        cache,
        fetcher,
        generation,
        classifier: Arc::new(Classifier::from_config(&config)),
        offline_document: url("https://app.example.com/"),
        swr_bypass_domains: Arc::new(config.swr_bypass_domains),
        background: BackgroundTasks::default(),
    }
}

/// Release source whose answer can be swapped between update checks.
pub struct SwitchableRelease {
    current: Mutex<Release>,
}

impl SwitchableRelease {
    pub fn new(date: &str) -> Self {
        Self { current: Mutex::new(release(date)) }
    }

    pub fn set(&self, date: &str) {
        *self.current.lock().unwrap() = release(date);
    }
}

#[async_trait::async_trait]
impl ReleaseSource for SwitchableRelease {
    async fn latest(&self) -> Result<Release, Error> {
        Ok(self.current.lock().unwrap().clone())
    }
}

pub fn release(date: &str) -> Release {
    let config = AppConfig { build_date: Some(date.into()), ..Default::default() };
    Release::from_config(&config).unwrap()
}

/// A reachable origin serving every default critical and static asset.
pub fn site() -> StubFetcher {
    StubFetcher::new()
        .route("https://app.example.com/", ok("<html>home</html>", "text/html"))
        .route("https://app.example.com/index.html", ok("<html>home</html>", "text/html"))
        .route("https://app.example.com/manifest.json", ok("{}", "application/manifest+json"))
        .route("https://app.example.com/favicon.ico", ok("ico", "image/x-icon"))
        .route("https://app.example.com/icons/icon-192.png", ok("png", "image/png"))
        .route("https://app.example.com/icons/icon-512.png", ok("png", "image/png"))
}
