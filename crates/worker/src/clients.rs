//! Open client pages.
//!
//! Every host page that issues requests through the proxy is a client. A
//! worker that activates claims all of them and posts messages to the ones it
//! controls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use offgrid_core::ClientMessage;
use tokio::sync::mpsc;

pub type ClientId = u64;

struct ClientEntry {
    controller: Option<String>,
    inbox: mpsc::UnboundedSender<ClientMessage>,
}

/// Registry of open client pages, shared by the runtime and its workers.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<ClientId, ClientEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl ClientRegistry {
    /// Open a page. The page is uncontrolled until a generation claims it.
    pub fn open(&self, url: impl Into<String>) -> ClientPage {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let url = url.into();

        tracing::debug!(client = id, url = %url, "client opened");
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, ClientEntry { controller: None, inbox: tx });

        ClientPage { id, inbox: rx, registry: self.clone() }
    }

    pub fn close(&self, id: ClientId) {
        if self.clients.write().unwrap_or_else(PoisonError::into_inner).remove(&id).is_some() {
            tracing::debug!(client = id, "client closed");
        }
    }

    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generation currently controlling a page.
    pub fn controller_of(&self, id: ClientId) -> Option<String> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.get(&id).and_then(|c| c.controller.clone())
    }

    pub fn set_controller(&self, id: ClientId, generation: &str) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get_mut(&id) {
            client.controller = Some(generation.to_string());
        }
    }

    /// Make `generation` the controller of every open page.
    ///
    /// Returns the number of pages claimed.
    pub fn claim(&self, generation: &str) -> usize {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        for client in clients.values_mut() {
            client.controller = Some(generation.to_string());
        }
        clients.len()
    }

    /// Post a message to every page controlled by `generation`.
    ///
    /// Pages whose inbox has been dropped are skipped. Returns the number of
    /// pages the message reached.
    pub fn post_to_controlled(&self, generation: &str, message: &ClientMessage) -> usize {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients
            .values()
            .filter(|c| c.controller.as_deref() == Some(generation))
            .filter(|c| c.inbox.send(message.clone()).is_ok())
            .count()
    }

    /// Drop control of every page, as after unregistering.
    pub fn release_all(&self) {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        for client in clients.values_mut() {
            client.controller = None;
        }
    }
}

/// A host page's end of the registry. Closing happens on drop.
pub struct ClientPage {
    id: ClientId,
    inbox: mpsc::UnboundedReceiver<ClientMessage>,
    registry: ClientRegistry,
}

impl ClientPage {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn controller(&self) -> Option<String> {
        self.registry.controller_of(self.id)
    }

    /// Wait for the next message posted by a controlling worker.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        self.inbox.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ClientMessage> {
        self.inbox.try_recv().ok()
    }
}

impl Drop for ClientPage {
    fn drop(&mut self) {
        self.registry.close(self.id);
    }
}
