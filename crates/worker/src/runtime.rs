//! Host of worker generations.
//!
//! The runtime holds the single registration with its active and waiting
//! workers, routes intercepted requests to the active one, owns the open
//! client pages and publishes [`RuntimeEvent`]s.
//!
//! ### Updates
//! - An update check asks the [`ReleaseSource`] for the latest release and
//!   installs it when its generation is new.
//! - An installed worker activates at once when nothing is active yet or when
//!   it asked to skip waiting. Otherwise it waits until a `SKIP_WAITING`
//!   control message arrives.
//! - Registration, update, promotion and unregistration are serialized.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use offgrid_core::config::AppConfig;
use offgrid_core::{CacheDb, Error, Fetcher, Generation, ProxyRequest, ProxyResponse};
use serde::Serialize;
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::task::JoinHandle;
use url::Url;

use crate::classifier::Classifier;
use crate::clients::{ClientPage, ClientRegistry};
use crate::connectivity::{Connectivity, ConnectivityMonitor, MonitoredFetcher};
use crate::control::ControlChannel;
use crate::lifecycle::LifecycleState;
use crate::release::ReleaseSource;
use crate::strategy::{BackgroundTasks, StrategyContext};
use crate::worker::{FetchDisposition, WorkerHandle};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    /// A generation took control of the open pages.
    ControllerChange { generation: String, previous: Option<String> },
    /// A generation installed and is waiting behind the active one.
    WaitingInstalled { generation: String },
    Online,
    Offline,
}

/// Whether update checks may be answered from an HTTP cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateViaCache {
    Imports,
    All,
    #[default]
    None,
}

impl UpdateViaCache {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateViaCache::Imports => "imports",
            UpdateViaCache::All => "all",
            UpdateViaCache::None => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationInfo {
    pub scope: String,
    pub update_via_cache: UpdateViaCache,
    pub active: Option<String>,
    pub waiting: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    UpToDate,
    Activated { generation: String },
    Waiting { generation: String },
}

#[derive(Clone)]
pub struct RuntimeOptions {
    pub enabled: bool,
    pub scope: Url,
    pub offline_document: Url,
    pub classifier: Arc<Classifier>,
    pub swr_bypass_domains: Arc<Vec<String>>,
    pub control_timeout: Duration,
    /// Installed workers ask to skip waiting.
    pub immediate_activation: bool,
}

impl RuntimeOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let scope = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let offline_document = scope
            .join(&config.offline_document)
            .map_err(|e| Error::InvalidUrl(format!("offline_document: {e}")))?;

        Ok(Self {
            enabled: config.enabled,
            scope,
            offline_document,
            classifier: Arc::new(Classifier::from_config(config)),
            swr_bypass_domains: Arc::new(config.swr_bypass_domains.clone()),
            control_timeout: config.control_timeout(),
            immediate_activation: true,
        })
    }
}

struct Registration {
    update_via_cache: UpdateViaCache,
    active: Option<WorkerHandle>,
    waiting: Option<WorkerHandle>,
    /// Promotes `waiting` once it asks to skip waiting.
    waiter: Option<JoinHandle<()>>,
}

struct Inner {
    cache: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    release: Arc<dyn ReleaseSource>,
    options: RuntimeOptions,
    clients: ClientRegistry,
    connectivity: ConnectivityMonitor,
    events: broadcast::Sender<RuntimeEvent>,
    registration: Mutex<Option<Registration>>,
    active: RwLock<Option<WorkerHandle>>,
    in_flight: AtomicUsize,
    idle: Notify,
}

#[derive(Clone)]
pub struct Runtime {
    inner: Arc<Inner>,
}

impl Runtime {
    pub fn new(cache: CacheDb, fetcher: Arc<dyn Fetcher>, release: Arc<dyn ReleaseSource>, options: RuntimeOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let connectivity = ConnectivityMonitor::new(events.clone());
        let fetcher: Arc<dyn Fetcher> = Arc::new(MonitoredFetcher::new(fetcher, connectivity.clone()));

        Self {
            inner: Arc::new(Inner {
                cache,
                fetcher,
                release,
                options,
                clients: ClientRegistry::default(),
                connectivity,
                events,
                registration: Mutex::new(None),
                active: RwLock::new(None),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Register the proxy, installing and activating the latest release.
    ///
    /// Registering again returns the existing registration untouched.
    pub async fn register(&self) -> Result<RegistrationInfo, Error> {
        if !self.inner.options.enabled {
            return Err(Error::Unsupported);
        }

        let mut slot = self.inner.registration.lock().await;
        if let Some(registration) = slot.as_ref() {
            return Ok(self.info(registration));
        }

        let mut registration =
            Registration { update_via_cache: UpdateViaCache::None, active: None, waiting: None, waiter: None };
        self.update_locked(&mut registration).await?;

        let info = self.info(&registration);
        tracing::info!(scope = %info.scope, active = ?info.active, "proxy registered");
        *slot = Some(registration);
        Ok(info)
    }

    /// Remove the registration and stop its workers. Partitions are kept.
    pub async fn unregister(&self) -> bool {
        let mut slot = self.inner.registration.lock().await;
        let Some(mut registration) = slot.take() else {
            return false;
        };

        if let Some(waiter) = registration.waiter.take() {
            waiter.abort();
        }
        *self.inner.active.write().unwrap_or_else(PoisonError::into_inner) = None;

        for worker in [registration.waiting.take(), registration.active.take()].into_iter().flatten() {
            worker.terminate();
            worker.flush().await;
        }
        self.inner.clients.release_all();

        tracing::info!("proxy unregistered");
        true
    }

    /// Check the release source for a new generation.
    pub async fn update(&self) -> Result<UpdateOutcome, Error> {
        let mut slot = self.inner.registration.lock().await;
        let registration = slot.as_mut().ok_or(Error::NotRegistered)?;
        self.update_locked(registration).await
    }

    /// Activate the waiting generation now. Returns its id, or `None` when
    /// nothing is waiting.
    pub async fn promote(&self) -> Result<Option<String>, Error> {
        let mut slot = self.inner.registration.lock().await;
        let Some(registration) = slot.as_mut() else {
            return Ok(None);
        };
        let Some(worker) = registration.waiting.take() else {
            return Ok(None);
        };

        // The waiter may be the caller; detach rather than abort.
        drop(registration.waiter.take());

        let id = worker.generation().id();
        self.activate_locked(registration, worker).await?;
        Ok(Some(id))
    }

    pub async fn registration(&self) -> Option<RegistrationInfo> {
        self.inner.registration.lock().await.as_ref().map(|r| self.info(r))
    }

    /// Control channel of the active worker.
    pub fn controller(&self) -> Option<ControlChannel> {
        self.active_worker().map(|w| w.control())
    }

    pub fn active_generation(&self) -> Option<Generation> {
        self.active_worker().map(|w| w.generation().clone())
    }

    pub fn controller_generation(&self) -> Option<String> {
        self.active_generation().map(|g| g.id())
    }

    /// Control channel of the waiting worker.
    pub async fn waiting(&self) -> Option<ControlChannel> {
        let slot = self.inner.registration.lock().await;
        slot.as_ref().and_then(|r| r.waiting.as_ref()).map(|w| w.control())
    }

    /// Issue a request through the proxy.
    ///
    /// Requests the active worker does not intercept, and every request while
    /// no worker is active, go straight to the network.
    pub async fn fetch(&self, request: ProxyRequest) -> Result<ProxyResponse, Error> {
        let _in_flight = InFlight::enter(&self.inner);

        let disposition = match self.active_worker() {
            Some(worker) => self.route(&worker, &request).await?,
            None => FetchDisposition::PassThrough,
        };

        match disposition {
            FetchDisposition::Respond(result) => result,
            FetchDisposition::PassThrough => self.inner.fetcher.fetch(&request).await,
        }
    }

    /// Dispatch to `worker`. If it was superseded while the request was
    /// queued, the request follows the new active worker once.
    async fn route(&self, worker: &WorkerHandle, request: &ProxyRequest) -> Result<FetchDisposition, Error> {
        let first = worker.dispatch(request.clone()).await;
        let superseded = match &first {
            Err(Error::WorkerTerminated(_)) => true,
            Ok(FetchDisposition::PassThrough) => worker.state() == LifecycleState::Redundant,
            _ => false,
        };
        if !superseded {
            return first;
        }

        match self.active_worker() {
            Some(next) if next.generation() != worker.generation() => {
                tracing::debug!(
                    url = %request.url,
                    from = %worker.generation(),
                    to = %next.generation(),
                    "rerouting request to new controller"
                );
                next.dispatch(request.clone()).await
            }
            _ => Ok(FetchDisposition::PassThrough),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Wait up to `max_wait` for a moment with no requests in flight.
    /// Returns whether one was found.
    pub async fn idle(&self, max_wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            let notified = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.in_flight() == 0;
            }
        }
    }

    /// Wait for every pending cache write of the current workers.
    pub async fn flush(&self) {
        let workers: Vec<WorkerHandle> = {
            let slot = self.inner.registration.lock().await;
            slot.as_ref()
                .map(|r| r.active.iter().chain(r.waiting.iter()).cloned().collect())
                .unwrap_or_default()
        };
        for worker in workers {
            worker.flush().await;
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.inner.events.subscribe()
    }

    /// Open a host page. It is controlled by the active generation, if any.
    pub fn open_client(&self, url: impl Into<String>) -> ClientPage {
        let page = self.inner.clients.open(url);
        if let Some(generation) = self.controller_generation() {
            self.inner.clients.set_controller(page.id(), &generation);
        }
        page
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.inner.clients
    }

    pub fn cache(&self) -> &CacheDb {
        &self.inner.cache
    }

    pub fn connectivity(&self) -> Connectivity {
        self.inner.connectivity.current()
    }

    /// Record a connectivity change observed outside the proxy.
    pub fn set_connectivity(&self, connectivity: Connectivity) -> bool {
        self.inner.connectivity.set(connectivity)
    }

    fn active_worker(&self) -> Option<WorkerHandle> {
        self.inner.active.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn info(&self, registration: &Registration) -> RegistrationInfo {
        RegistrationInfo {
            scope: self.inner.options.scope.to_string(),
            update_via_cache: registration.update_via_cache,
            active: registration.active.as_ref().map(|w| w.generation().id()),
            waiting: registration.waiting.as_ref().map(|w| w.generation().id()),
        }
    }

    fn context(&self, generation: Generation) -> StrategyContext {
        let options = &self.inner.options;
        StrategyContext {
            cache: self.inner.cache.clone(),
            fetcher: self.inner.fetcher.clone(),
            generation,
            classifier: options.classifier.clone(),
            offline_document: options.offline_document.clone(),
            swr_bypass_domains: options.swr_bypass_domains.clone(),
            background: BackgroundTasks::default(),
        }
    }

    async fn update_locked(&self, registration: &mut Registration) -> Result<UpdateOutcome, Error> {
        let release = self.inner.release.latest().await?;

        let mut known = registration.active.iter().chain(registration.waiting.iter());
        if known.any(|w| w.generation() == &release.generation) {
            tracing::debug!(generation = %release.generation, "release already installed");
            return Ok(UpdateOutcome::UpToDate);
        }

        let options = &self.inner.options;
        let worker = WorkerHandle::spawn(
            self.context(release.generation.clone()),
            self.inner.clients.clone(),
            options.control_timeout,
            options.immediate_activation,
        );
        tracing::info!(generation = %release.generation, "installing generation");

        if let Err(e) = worker.install(release.manifest).await {
            worker.terminate();
            return Err(e);
        }

        let generation = worker.generation().id();
        self.discard_waiting(registration);

        if registration.active.is_none() || worker.skip_waiting_requested() {
            self.activate_locked(registration, worker).await?;
            return Ok(UpdateOutcome::Activated { generation });
        }

        registration.waiter = Some(self.spawn_waiter(&worker));
        registration.waiting = Some(worker);
        tracing::info!(generation = %generation, "generation waiting");
        let _ = self.inner.events.send(RuntimeEvent::WaitingInstalled { generation: generation.clone() });
        Ok(UpdateOutcome::Waiting { generation })
    }

    /// Activation runs eviction, claim and broadcast before the worker
    /// receives any traffic.
    async fn activate_locked(&self, registration: &mut Registration, worker: WorkerHandle) -> Result<(), Error> {
        if let Some(previous) = &registration.active {
            previous.flush().await;
        }

        if let Err(e) = worker.activate().await {
            worker.terminate();
            return Err(e);
        }

        let generation = worker.generation().id();
        *self.inner.active.write().unwrap_or_else(PoisonError::into_inner) = Some(worker.clone());
        let previous = registration.active.replace(worker);
        let previous_id = previous.as_ref().map(|p| p.generation().id());
        if let Some(previous) = previous {
            previous.terminate();
        }

        tracing::info!(generation = %generation, previous = ?previous_id, "controller changed");
        let _ = self
            .inner
            .events
            .send(RuntimeEvent::ControllerChange { generation, previous: previous_id });
        Ok(())
    }

    fn discard_waiting(&self, registration: &mut Registration) {
        if let Some(waiter) = registration.waiter.take() {
            waiter.abort();
        }
        if let Some(superseded) = registration.waiting.take() {
            tracing::info!(generation = %superseded.generation(), "waiting generation superseded");
            superseded.terminate();
        }
    }

    fn spawn_waiter(&self, worker: &WorkerHandle) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        let worker = worker.clone();
        tokio::spawn(async move {
            if !worker.wait_skip_waiting().await {
                return;
            }
            let Some(inner) = inner.upgrade() else {
                return;
            };
            match (Runtime { inner }).promote().await {
                Ok(Some(generation)) => tracing::debug!(generation = %generation, "waiting generation promoted"),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "promotion failed"),
            }
        })
    }
}

struct InFlight<'a>(&'a Inner);

impl<'a> InFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use offgrid_core::{ClientMessage, PartitionKind};

    use super::*;
    use crate::testing::{StubFetcher, SwitchableRelease, generation, ok, site, url};

    async fn runtime_with(fetcher: Arc<StubFetcher>, release: Arc<SwitchableRelease>, immediate: bool) -> Runtime {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let mut options = RuntimeOptions::from_config(&AppConfig::default()).unwrap();
        options.immediate_activation = immediate;
        Runtime::new(cache, fetcher, release, options)
    }

    async fn runtime(fetcher: Arc<StubFetcher>) -> Runtime {
        runtime_with(fetcher, Arc::new(SwitchableRelease::new("2025-01-15")), true).await
    }

    async fn next_event(rx: &mut broadcast::Receiver<RuntimeEvent>) -> RuntimeEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap()
    }

    async fn sorted_partitions(runtime: &Runtime) -> Vec<String> {
        let mut names = runtime.cache().partition_names().await.unwrap();
        names.sort();
        names
    }

    fn expected_partitions(date: &str) -> Vec<String> {
        let mut names = generation(date).partitions().to_vec();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_first_visit_installs_and_controls() {
        let runtime = runtime(Arc::new(site())).await;
        let mut events = runtime.subscribe();
        let mut page = runtime.open_client("https://app.example.com/");
        assert!(page.controller().is_none());

        let info = runtime.register().await.unwrap();
        assert_eq!(info.active.as_deref(), Some("app-v2025-01-15"));
        assert_eq!(info.update_via_cache, UpdateViaCache::None);
        assert_eq!(sorted_partitions(&runtime).await, expected_partitions("2025-01-15"));

        assert_eq!(page.controller().as_deref(), Some("app-v2025-01-15"));
        assert_eq!(page.try_recv(), Some(ClientMessage::SwUpdated { version: "app-v2025-01-15".into() }));
        assert_eq!(
            next_event(&mut events).await,
            RuntimeEvent::ControllerChange { generation: "app-v2025-01-15".into(), previous: None }
        );

        let later = runtime.open_client("https://app.example.com/bugs");
        assert_eq!(later.controller().as_deref(), Some("app-v2025-01-15"));
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let fetcher = Arc::new(site());
        let runtime = runtime(fetcher.clone()).await;
        let first = runtime.register().await.unwrap();
        let calls = fetcher.calls();

        let second = runtime.register().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), calls);
    }

    #[tokio::test]
    async fn test_register_when_disabled() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let config = AppConfig { enabled: false, ..Default::default() };
        let options = RuntimeOptions::from_config(&config).unwrap();
        let runtime = Runtime::new(cache, Arc::new(site()), Arc::new(SwitchableRelease::new("2025-01-15")), options);
        assert!(matches!(runtime.register().await, Err(Error::Unsupported)));
    }

    #[tokio::test]
    async fn test_failed_register_leaves_nothing_registered() {
        let runtime = runtime(Arc::new(StubFetcher::new())).await;
        assert!(matches!(runtime.register().await, Err(Error::InstallFailed { .. })));
        assert!(runtime.registration().await.is_none());
        assert!(runtime.controller().is_none());
    }

    #[tokio::test]
    async fn test_update_replaces_generation() {
        let release = Arc::new(SwitchableRelease::new("2025-01-10"));
        let runtime = runtime_with(Arc::new(site()), release.clone(), true).await;
        let mut first = runtime.open_client("https://app.example.com/");
        runtime.register().await.unwrap();
        let mut second = runtime.open_client("https://app.example.com/bugs");
        assert_eq!(first.try_recv(), Some(ClientMessage::SwUpdated { version: "app-v2025-01-10".into() }));
        let mut events = runtime.subscribe();

        assert_eq!(runtime.update().await.unwrap(), UpdateOutcome::UpToDate);

        release.set("2025-01-15");
        assert_eq!(
            runtime.update().await.unwrap(),
            UpdateOutcome::Activated { generation: "app-v2025-01-15".into() }
        );
        assert_eq!(sorted_partitions(&runtime).await, expected_partitions("2025-01-15"));

        let notice = ClientMessage::SwUpdated { version: "app-v2025-01-15".into() };
        assert_eq!(first.try_recv(), Some(notice.clone()));
        assert_eq!(second.try_recv(), Some(notice));
        assert_eq!(
            next_event(&mut events).await,
            RuntimeEvent::ControllerChange {
                generation: "app-v2025-01-15".into(),
                previous: Some("app-v2025-01-10".into())
            }
        );
    }

    #[tokio::test]
    async fn test_offline_navigation_without_cache() {
        let fetcher = Arc::new(site());
        let runtime = runtime(fetcher.clone()).await;
        runtime.register().await.unwrap();
        runtime.controller().unwrap().clear_cache().await.unwrap();
        fetcher.clear_routes();

        let response = runtime
            .fetch(ProxyRequest::navigate(url("https://app.example.com/bugs/42")))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.text(), "Offline");
    }

    #[tokio::test]
    async fn test_request_racing_activation_follows_new_controller() {
        let release = Arc::new(SwitchableRelease::new("2025-01-10"));
        let runtime = runtime_with(Arc::new(site()), release.clone(), true).await;
        runtime.register().await.unwrap();
        let previous = runtime.active_worker().unwrap();

        release.set("2025-01-15");
        runtime.update().await.unwrap();
        assert_eq!(previous.state(), LifecycleState::Redundant);

        let request = ProxyRequest::navigate(url("https://app.example.com/"));
        match runtime.route(&previous, &request).await.unwrap() {
            FetchDisposition::Respond(Ok(response)) => assert_eq!(response.status, 200),
            other => panic!("expected the new controller to answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_without_registration() {
        let runtime = runtime(Arc::new(site())).await;
        assert!(matches!(runtime.update().await, Err(Error::NotRegistered)));
    }

    #[tokio::test]
    async fn test_offline_navigation_served_from_precache() {
        let fetcher = Arc::new(site());
        let runtime = runtime(fetcher.clone()).await;
        runtime.register().await.unwrap();
        fetcher.clear_routes();

        let response = runtime
            .fetch(ProxyRequest::navigate(url("https://app.example.com/")))
            .await
            .unwrap();
        assert_eq!(response.text(), "<html>home</html>");
        runtime.flush().await;
    }

    #[tokio::test]
    async fn test_excluded_request_passes_through() {
        let fetcher = Arc::new(site().route("http://localhost:5173/@vite/client", ok("hmr", "text/javascript")));
        let runtime = runtime(fetcher.clone()).await;
        runtime.register().await.unwrap();

        let request = ProxyRequest::get(url("http://localhost:5173/@vite/client"));
        let response = runtime.fetch(request.clone()).await.unwrap();
        assert_eq!(response.header("x-served-by"), Some("network"));
        assert_eq!(response.text(), "hmr");

        runtime.flush().await;
        let partitions = generation("2025-01-15").partitions();
        assert!(runtime.cache().match_any(&partitions, &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_waiting_generation_activates_on_skip_waiting() {
        let release = Arc::new(SwitchableRelease::new("2025-01-15"));
        let runtime = runtime_with(Arc::new(site()), release.clone(), false).await;
        runtime.register().await.unwrap();
        let mut events = runtime.subscribe();

        release.set("2025-02-01");
        assert_eq!(runtime.update().await.unwrap(), UpdateOutcome::Waiting { generation: "app-v2025-02-01".into() });
        assert_eq!(
            next_event(&mut events).await,
            RuntimeEvent::WaitingInstalled { generation: "app-v2025-02-01".into() }
        );
        assert_eq!(runtime.controller_generation().as_deref(), Some("app-v2025-01-15"));

        runtime.waiting().await.unwrap().skip_waiting().await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            RuntimeEvent::ControllerChange {
                generation: "app-v2025-02-01".into(),
                previous: Some("app-v2025-01-15".into())
            }
        );
        assert_eq!(runtime.controller_generation().as_deref(), Some("app-v2025-02-01"));
        assert_eq!(sorted_partitions(&runtime).await, expected_partitions("2025-02-01"));
    }

    #[tokio::test]
    async fn test_control_through_controller() {
        let runtime = runtime(Arc::new(site())).await;
        runtime.register().await.unwrap();
        let control = runtime.controller().unwrap();

        assert_eq!(control.get_version().await.unwrap(), "app-v2025-01-15");
        control.clear_cache().await.unwrap();
        assert!(runtime.cache().partition_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connectivity_follows_network() {
        let fetcher = Arc::new(site());
        let runtime = runtime(fetcher.clone()).await;
        runtime.register().await.unwrap();
        let mut events = runtime.subscribe();

        fetcher.clear_routes();
        let api = ProxyRequest::get(url("https://app.example.com/api/bugs"));
        assert!(runtime.fetch(api.clone()).await.is_err());
        assert_eq!(next_event(&mut events).await, RuntimeEvent::Offline);
        assert_eq!(runtime.connectivity(), Connectivity::Offline);

        fetcher.set_route("https://app.example.com/api/bugs", ok("[]", "application/json"));
        runtime.fetch(api).await.unwrap();
        assert_eq!(next_event(&mut events).await, RuntimeEvent::Online);
    }

    #[tokio::test]
    async fn test_unregister_releases_clients() {
        let runtime = runtime(Arc::new(site())).await;
        let page = runtime.open_client("https://app.example.com/");
        runtime.register().await.unwrap();

        assert!(runtime.unregister().await);
        assert!(runtime.controller().is_none());
        assert!(page.controller().is_none());
        assert!(!runtime.unregister().await);
        assert_eq!(sorted_partitions(&runtime).await, expected_partitions("2025-01-15"));
    }

    #[tokio::test]
    async fn test_idle_when_nothing_in_flight() {
        let runtime = runtime(Arc::new(site())).await;
        assert_eq!(runtime.in_flight(), 0);
        assert!(runtime.idle(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_stored_responses_land_in_current_generation() {
        let fetcher = Arc::new(site().route("https://app.example.com/app.css", ok("body{}", "text/css")));
        let runtime = runtime(fetcher).await;
        runtime.register().await.unwrap();

        let request = ProxyRequest::get(url("https://app.example.com/app.css"));
        runtime.fetch(request.clone()).await.unwrap();
        runtime.flush().await;

        let partition = generation("2025-01-15").partition(PartitionKind::Static);
        assert!(runtime.cache().match_in(&partition, &request).await.unwrap().is_some());
    }
}
