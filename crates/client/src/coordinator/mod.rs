//! Host-side coordinator for the proxy.
//!
//! The coordinator is the one object the host application talks to. It
//! registers the proxy, runs the periodic update check, forwards control
//! messages and republishes runtime events to three listener lists:
//! update, online and offline.
//!
//! ### Lifecycle
//! - Construct with [`Coordinator::new`] inside a tokio runtime; this starts
//!   the event pump.
//! - [`Coordinator::register`] registers the proxy and starts the update
//!   timer.
//! - [`Coordinator::unregister`] stops the timer, removes the registration and
//!   drops every listener.

mod schedule;
mod subscriptions;

pub use subscriptions::{EventChannel, Subscription, UpdateNotice};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use offgrid_core::config::AppConfig;
use offgrid_core::{ClientMessage, Error};
use offgrid_worker::{ClientPage, RegistrationInfo, Runtime, RuntimeEvent, UpdateOutcome};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use schedule::{LastCheck, Schedule};
use subscriptions::Subscriptions;

/// Version reported when no proxy is active.
pub const NOT_REGISTERED: &str = "not-registered";

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Interval between periodic update checks (default: 5 minutes)
    pub update_interval: Duration,

    /// Whether update checks wait for an idle window (default: true)
    pub idle_scheduling: bool,

    /// Longest wait for an idle window (default: 2s)
    pub idle_wait: Duration,

    /// URL of the host page the coordinator runs in.
    pub page_url: String,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(300),
            idle_scheduling: true,
            idle_wait: Duration::from_secs(2),
            page_url: "https://app.example.com/".into(),
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            update_interval: config.update_interval(),
            idle_scheduling: config.idle_scheduling,
            page_url: config.origin.clone(),
            ..Self::default()
        }
    }

    fn schedule(&self) -> Schedule {
        Schedule { interval: self.update_interval, idle_scheduling: self.idle_scheduling, idle_wait: self.idle_wait }
    }
}

pub struct Coordinator {
    runtime: Runtime,
    options: CoordinatorOptions,
    subscriptions: Arc<Subscriptions>,
    timer: Mutex<Option<JoinHandle<()>>>,
    pump: JoinHandle<()>,
    last_check: LastCheck,
    last_notice: Arc<Mutex<Option<String>>>,
}

impl Coordinator {
    pub fn new(runtime: Runtime, options: CoordinatorOptions) -> Self {
        let subscriptions = Arc::new(Subscriptions::new());
        let last_notice = Arc::new(Mutex::new(None));
        let page = runtime.open_client(options.page_url.clone());
        let pump = tokio::spawn(pump(runtime.subscribe(), page, subscriptions.clone(), last_notice.clone()));

        Self {
            runtime,
            options,
            subscriptions,
            timer: Mutex::new(None),
            pump,
            last_check: Arc::new(Mutex::new(None)),
            last_notice,
        }
    }

    /// Register the proxy and start periodic update checks.
    ///
    /// Returns `None` when the proxy runtime is unavailable. Registering twice
    /// returns the existing registration.
    pub async fn register(&self) -> Result<Option<RegistrationInfo>, Error> {
        let info = match self.runtime.register().await {
            Ok(info) => info,
            Err(Error::Unsupported) => {
                tracing::info!("proxy runtime unavailable, running without offline support");
                return Ok(None);
            }
            Err(e) => {
                tracing::error!(error = %e, "proxy registration failed");
                return Err(e);
            }
        };

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.is_none() {
            tracing::debug!(interval_secs = self.options.update_interval.as_secs(), "starting update timer");
            *timer = Some(schedule::spawn_update_timer(
                self.runtime.clone(),
                self.options.schedule(),
                self.last_check.clone(),
            ));
        }
        Ok(Some(info))
    }

    /// Stop the update timer, remove the registration and drop every listener.
    /// Returns whether a registration existed.
    pub async fn unregister(&self) -> bool {
        if let Some(timer) = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take() {
            timer.abort();
        }
        let removed = self.runtime.unregister().await;
        self.subscriptions.clear_all();
        removed
    }

    /// Ask the registration to check for a new generation now.
    pub async fn update(&self) -> Result<UpdateOutcome, Error> {
        let outcome = self.runtime.update().await;
        *self.last_check.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        outcome
    }

    /// Delete every partition. Always succeeds: when the proxy cannot do it,
    /// the partitions are deleted directly.
    pub async fn clear_cache(&self) -> bool {
        if let Some(control) = self.runtime.controller() {
            match control.clear_cache().await {
                Ok(()) => return true,
                Err(e) => tracing::warn!(error = %e, "proxy cache clear failed, deleting directly"),
            }
        }

        match self.runtime.cache().delete_all_partitions().await {
            Ok(count) => tracing::info!(partitions = count, "cleared partitions directly"),
            Err(e) => tracing::warn!(error = %e, "direct cache clear failed"),
        }
        true
    }

    /// Generation id of the active proxy, or [`NOT_REGISTERED`].
    pub async fn get_version(&self) -> Result<String, Error> {
        match self.runtime.controller() {
            Some(control) => control.get_version().await,
            None => Ok(NOT_REGISTERED.to_string()),
        }
    }

    /// Tell a waiting generation to activate. Returns whether one was waiting.
    pub async fn skip_waiting(&self) -> Result<bool, Error> {
        match self.runtime.waiting().await {
            Some(control) => control.skip_waiting().await.map(|()| true),
            None => Ok(false),
        }
    }

    pub fn on_update(&self, listener: impl Fn(&UpdateNotice) + Send + Sync + 'static) -> Subscription {
        self.subscriptions.update.subscribe(listener)
    }

    pub fn on_online(&self, listener: impl Fn(&()) + Send + Sync + 'static) -> Subscription {
        self.subscriptions.online.subscribe(listener)
    }

    pub fn on_offline(&self, listener: impl Fn(&()) + Send + Sync + 'static) -> Subscription {
        self.subscriptions.offline.subscribe(listener)
    }

    pub async fn registration(&self) -> Option<RegistrationInfo> {
        self.runtime.registration().await
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn update_timer_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub fn last_update_check(&self) -> Option<DateTime<Utc>> {
        *self.last_check.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Version from the most recent `SW_UPDATED` message this page received.
    pub fn last_update_notice(&self) -> Option<String> {
        self.last_notice.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.pump.abort();
        if let Some(timer) = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take() {
            timer.abort();
        }
    }
}

async fn pump(
    mut events: broadcast::Receiver<RuntimeEvent>, mut page: ClientPage, subscriptions: Arc<Subscriptions>,
    last_notice: Arc<Mutex<Option<String>>>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => dispatch(&subscriptions, event),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "runtime events dropped"),
                Err(RecvError::Closed) => break,
            },
            Some(message) = page.recv() => match message {
                ClientMessage::SwUpdated { version } => {
                    tracing::info!(version = %version, "proxy reported update");
                    *last_notice.lock().unwrap_or_else(PoisonError::into_inner) = Some(version);
                }
            },
        }
    }
}

fn dispatch(subscriptions: &Subscriptions, event: RuntimeEvent) {
    match event {
        RuntimeEvent::ControllerChange { generation, previous: Some(previous) } => {
            tracing::info!(generation = %generation, previous = %previous, "new generation in control");
            subscriptions.update.emit(&UpdateNotice { generation, activated: true });
        }
        RuntimeEvent::ControllerChange { generation, previous: None } => {
            tracing::debug!(generation = %generation, "first generation in control");
        }
        RuntimeEvent::WaitingInstalled { generation } => {
            tracing::info!(generation = %generation, "new generation waiting");
            subscriptions.update.emit(&UpdateNotice { generation, activated: false });
        }
        RuntimeEvent::Online => {
            subscriptions.online.emit(&());
        }
        RuntimeEvent::Offline => {
            subscriptions.offline.emit(&());
        }
    }
}
