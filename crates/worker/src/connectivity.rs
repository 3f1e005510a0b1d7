//! Online/offline tracking.
//!
//! The runtime's view of connectivity follows the outcome of real network
//! traffic: a completed fetch means online, a transport failure means offline.
//! Each transition is published once as a [`RuntimeEvent`].

use std::sync::Arc;

use offgrid_core::{Error, Fetcher, ProxyRequest, ProxyResponse};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::runtime::RuntimeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<Connectivity>>,
    events: broadcast::Sender<RuntimeEvent>,
}

impl ConnectivityMonitor {
    /// Starts online.
    pub fn new(events: broadcast::Sender<RuntimeEvent>) -> Self {
        let (state, _) = watch::channel(Connectivity::Online);
        Self { state: Arc::new(state), events }
    }

    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    /// Record a connectivity observation. Returns whether it changed.
    pub fn set(&self, next: Connectivity) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });

        if changed {
            tracing::info!(connectivity = ?next, "connectivity changed");
            let event = match next {
                Connectivity::Online => RuntimeEvent::Online,
                Connectivity::Offline => RuntimeEvent::Offline,
            };
            let _ = self.events.send(event);
        }
        changed
    }
}

/// A fetcher that reports every outcome to a [`ConnectivityMonitor`].
pub struct MonitoredFetcher {
    inner: Arc<dyn Fetcher>,
    monitor: ConnectivityMonitor,
}

impl MonitoredFetcher {
    pub fn new(inner: Arc<dyn Fetcher>, monitor: ConnectivityMonitor) -> Self {
        Self { inner, monitor }
    }
}

#[async_trait::async_trait]
impl Fetcher for MonitoredFetcher {
    async fn fetch(&self, request: &ProxyRequest) -> Result<ProxyResponse, Error> {
        let result = self.inner.fetch(request).await;
        match &result {
            Ok(_) => {
                self.monitor.set(Connectivity::Online);
            }
            Err(e) if e.is_network() => {
                self.monitor.set(Connectivity::Offline);
            }
            Err(_) => {}
        }
        result
    }
}
