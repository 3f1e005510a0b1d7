//! Typed listener lists with explicit unsubscription.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// One event kind and the callbacks listening for it.
pub struct EventChannel<T> {
    name: &'static str,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T: 'static> EventChannel<T> {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self { name, listeners: Mutex::new(Vec::new()), next_id: AtomicU64::new(0) })
    }

    pub fn subscribe(self: &Arc<Self>, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, Arc::new(listener)));

        let channel: Weak<Self> = Arc::downgrade(self);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(channel) = channel.upgrade() {
                    channel.lock().retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Call every listener with `event`. A panicking listener is logged and
    /// does not stop the others. Returns the number of listeners called.
    pub fn emit(&self, event: &T) -> usize {
        let listeners: Vec<Listener<T>> = self.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!(channel = self.name, "listener panicked");
            }
        }
        listeners.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Listener<T>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle returned by `subscribe`. Dropping it keeps the listener registered.
#[must_use = "dropping a subscription keeps the listener; call unsubscribe to remove it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// A new generation is taking over, or is waiting to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateNotice {
    pub generation: String,
    /// `false` while the new generation is still waiting.
    pub activated: bool,
}

/// The coordinator's three listener lists.
pub(crate) struct Subscriptions {
    pub update: Arc<EventChannel<UpdateNotice>>,
    pub online: Arc<EventChannel<()>>,
    pub offline: Arc<EventChannel<()>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self { update: EventChannel::new("update"), online: EventChannel::new("online"), offline: EventChannel::new("offline") }
    }

    pub fn clear_all(&self) {
        self.update.clear();
        self.online.clear();
        self.offline.clear();
    }
}
