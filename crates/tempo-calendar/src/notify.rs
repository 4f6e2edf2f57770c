//! Change notification for cache consumers.
//!
//! A minimal observer list: views subscribe, mutations trigger. No payload
//! is carried; consumers re-read the cache. Dropping the returned
//! [`Subscription`] removes the listener, so a consumer that goes away is
//! never called again.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Broadcasts "occurrences changed, recompute" to live subscribers.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    registry: Arc<Mutex<Registry>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. The listener stays registered until the
    /// returned guard is dropped or `unsubscribe` is called.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Invoke every live listener once.
    pub fn notify(&self) {
        // Snapshot outside the lock so a listener may subscribe/unsubscribe.
        let listeners: Vec<Listener> = {
            let registry = self.registry.lock();
            registry
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener();
        }
    }

    /// Number of live listeners.
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

/// Guard for a registered listener; dropping it unsubscribes.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    id: u64,
}

impl Subscription {
    /// Remove the listener now instead of waiting for drop.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().listeners.retain(|(id, _)| *id != self.id);
        }
    }
}
