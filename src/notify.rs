//! Change notifications and the subscription interface.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::state::Availability;

/// What changed about a device.
///
/// State-value changes and availability changes are distinct so consumers
/// can tell "values changed" from "the device went away / came back".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The light state (and counter) advanced.
    State,
    /// The device transitioned Online/Offline.
    Availability(Availability),
}

/// A change notification delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub address: Ipv4Addr,
    pub kind: ChangeKind,
}

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync + 'static>;

/// The subscriber table shared between the client and its background tasks.
#[derive(Clone, Default)]
pub(crate) struct Subscribers {
    inner: Arc<Mutex<HashMap<Uuid, Callback>>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().insert(id, Arc::new(callback));
        Subscription {
            id,
            table: Arc::clone(&self.inner),
        }
    }

    /// Deliver an event to every subscriber. Callbacks run outside the
    /// table lock, so a callback may subscribe or unsubscribe freely.
    pub fn emit(&self, event: &ChangeEvent) {
        let callbacks: Vec<Callback> = self.inner.lock().unwrap().values().cloned().collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn emit_all(&self, events: &[ChangeEvent]) {
        for event in events {
            self.emit(event);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Handle returned by [`PixelAirClient::subscribe`](crate::PixelAirClient::subscribe).
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe))
/// removes the callback.
#[must_use = "dropping a Subscription removes the callback"]
pub struct Subscription {
    id: Uuid,
    table: Arc<Mutex<HashMap<Uuid, Callback>>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.table.lock().unwrap().remove(&self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event() -> ChangeEvent {
        ChangeEvent {
            address: Ipv4Addr::LOCALHOST,
            kind: ChangeKind::State,
        }
    }

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let subscribers = Subscribers::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        let subscription = subscribers.add(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(subscribers.len(), 1);

        subscribers.emit(&event());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        assert_eq!(subscribers.len(), 0);
        subscribers.emit(&event());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let subscribers = Subscribers::new();
        {
            let _subscription = subscribers.add(|_| {});
            assert_eq!(subscribers.len(), 1);
        }
        assert_eq!(subscribers.len(), 0);
    }
}
