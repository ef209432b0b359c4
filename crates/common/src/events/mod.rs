//! Listener fan-out with per-callback isolation
//!
//! [`Listeners`] is an ordered list of callbacks for one event type;
//! [`EventBus`] maps event names to their own [`Listeners`]. Emitting
//! snapshots the registered callbacks, releases the lock, then invokes each
//! callback inside `catch_unwind`: a panicking subscriber is logged and the
//! remaining subscribers are still notified. Callbacks may subscribe or
//! unsubscribe re-entrantly.
//!
//! Dropping a [`Subscription`] leaves the callback registered; call
//! [`Subscription::unsubscribe`] to remove it.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::error;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    entries: Vec<(u64, Callback<E>)>,
}

/// Ordered set of callbacks for one event type
pub struct Listeners<E: 'static> {
    name: &'static str,
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> Listeners<E> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, registry: Arc::new(Mutex::new(Registry { next_id: 1, entries: Vec::new() })) }
    }

    /// Register a callback; returns the handle that removes it again
    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(registry) = weak.upgrade() {
                    registry.lock().entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Invoke every callback in registration order
    ///
    /// Returns the number of callbacks that completed without panicking.
    pub fn emit(&self, event: &E) -> usize {
        let snapshot: Vec<(u64, Callback<E>)> = self.registry.lock().entries.clone();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!(
                        listeners = self.name,
                        listener_id = id,
                        panic = %message,
                        "listener panicked"
                    );
                }
            }
        }
        delivered
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every callback
    pub fn clear(&self) {
        self.registry.lock().entries.clear();
    }
}

impl<E: 'static> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("name", &self.name).field("len", &self.len()).finish()
    }
}

/// Handle returned by [`Listeners::add`] and [`EventBus::subscribe`]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the callback; a no-op if its registry is already gone
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("active", &self.remove.is_some()).finish()
    }
}

/// Named publish/subscribe channels sharing one event type
pub struct EventBus<K, E: 'static>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    name: &'static str,
    channels: Mutex<HashMap<K, Listeners<E>>>,
}

impl<K, E: 'static> EventBus<K, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, channels: Mutex::new(HashMap::new()) }
    }

    pub fn subscribe<F>(&self, key: K, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut channels = self.channels.lock();
        channels.entry(key).or_insert_with(|| Listeners::new(self.name)).add(callback)
    }

    /// Notify subscribers of `key`; returns how many completed normally
    pub fn emit(&self, key: &K, event: &E) -> usize {
        // Listeners share their registry through an Arc, so cloning the
        // handle lets us drop the map lock before invoking callbacks.
        let listeners = {
            let channels = self.channels.lock();
            match channels.get(key) {
                Some(listeners) => {
                    Listeners { name: listeners.name, registry: Arc::clone(&listeners.registry) }
                }
                None => return 0,
            }
        };
        listeners.emit(event)
    }

    #[must_use]
    pub fn subscriber_count(&self, key: &K) -> usize {
        self.channels.lock().get(key).map_or(0, Listeners::len)
    }

    pub fn clear(&self) {
        self.channels.lock().clear();
    }
}

impl<K, E: 'static> fmt::Debug for EventBus<K, E>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels.lock();
        let keys: Vec<&K> = channels.keys().collect();
        f.debug_struct("EventBus").field("name", &self.name).field("channels", &keys).finish()
    }
}
