//! Subscriber registry and event routing.

use crate::error::EventBusError;
use crate::payloads::{ConfigEvent, DEFAULT_WATCH_CAPACITY, EventEnvelope, EventId, SubscriberId};
use chrono::Utc;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

/// Stream wrapper used by async watchers.
pub type EventStream = BroadcastStream<EventEnvelope>;

type Callback = Arc<dyn Fn(&ConfigEvent) + Send + Sync>;

/// Shared registry of synchronous subscribers plus an async broadcast fan-out.
#[derive(Clone)]
pub struct SubscriberRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    subscribers: Mutex<Vec<(SubscriberId, Callback)>>,
    next_subscriber: AtomicU64,
    next_event: AtomicU64,
    sender: Sender<EventEnvelope>,
}

/// Outcome of delivering one event to every registered subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Identifier assigned to the dispatched event.
    pub event_id: EventId,
    /// Number of subscribers whose callback returned normally.
    pub delivered: usize,
    /// Subscribers whose callback panicked.
    pub failures: Vec<EventBusError>,
}

impl SubscriberRegistry {
    /// Construct a registry whose watch channel buffers `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "watch capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(RegistryInner {
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                next_event: AtomicU64::new(1),
                sender,
            }),
        }
    }

    /// Construct a registry with the default watch capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_WATCH_CAPACITY)
    }

    /// Register a callback. Registering the same closure twice yields two
    /// independent subscriptions.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ConfigEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner.lock_subscribers().push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Number of active synchronous subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock_subscribers().len()
    }

    /// Returns `true` when no synchronous subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open an async stream receiving every event dispatched from now on.
    #[must_use]
    pub fn watch(&self) -> EventStream {
        BroadcastStream::new(self.inner.sender.subscribe())
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// Callbacks run on the caller's thread. The subscriber list is
    /// snapshotted first, so callbacks may subscribe, unsubscribe or publish
    /// without deadlocking.
    pub fn publish(&self, event: ConfigEvent) -> DispatchReport {
        let event_id = self.inner.next_event.fetch_add(1, Ordering::Relaxed);
        let kind = event.kind();
        let snapshot: Vec<(SubscriberId, Callback)> = self
            .inner
            .lock_subscribers()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        let mut delivered = 0;
        let mut failures = Vec::new();
        for (subscriber, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    let detail = panic_detail(payload.as_ref());
                    warn!(subscriber, event_kind = kind, detail = %detail, "settings subscriber panicked");
                    failures.push(EventBusError::SubscriberPanicked {
                        subscriber,
                        event_kind: kind,
                        detail,
                    });
                }
            }
        }

        let envelope = EventEnvelope {
            id: event_id,
            timestamp: Utc::now(),
            event,
        };
        let _ = self.inner.sender.send(envelope);

        DispatchReport {
            event_id,
            delivered,
            failures,
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryInner {
    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<(SubscriberId, Callback)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for a registered callback.
///
/// The callback stays registered until [`Subscription::unsubscribe`] is
/// called; dropping the handle does not remove it.
#[must_use = "keep the subscription to be able to unsubscribe later"]
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    registry: Weak<RegistryInner>,
}

impl Subscription {
    /// Identifier assigned at registration.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the callback. Returns `false` when the registry no longer exists.
    pub fn unsubscribe(self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut subscribers = inner.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != self.id);
        subscribers.len() != before
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tokio_stream::StreamExt;

    fn save_event() -> ConfigEvent {
        ConfigEvent::Save { config: json!({}) }
    }

    #[test]
    fn delivers_in_registration_order() {
        let registry = SubscriberRegistry::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            let _sub = registry.subscribe(move |_| seen.lock().unwrap().push(label));
        }

        let report = registry.publish(save_event());
        assert_eq!(report.delivered, 3);
        assert!(report.failures.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_later_ones() {
        let registry = SubscriberRegistry::new();
        let _a = registry.subscribe(|_| panic!("subscriber a failed"));
        let received = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let _b = registry.subscribe(move |event| sink.lock().unwrap().push(event.kind()));

        let report = registry.publish(save_event());
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].event_kind(), "save");
        assert_eq!(*received.lock().unwrap(), vec!["save"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_registration() {
        let registry = SubscriberRegistry::new();
        let count = Arc::new(AtomicU64::new(0));
        let callback = {
            let count = Arc::clone(&count);
            move |_: &ConfigEvent| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        let first = registry.subscribe(callback.clone());
        let _second = registry.subscribe(callback);
        assert_eq!(registry.len(), 2);

        assert!(first.unsubscribe());
        assert_eq!(registry.len(), 1);

        registry.publish(save_event());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_after_registry_dropped_is_harmless() {
        let registry = SubscriberRegistry::new();
        let sub = registry.subscribe(|_| {});
        drop(registry);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn event_ids_are_sequential() {
        let registry = SubscriberRegistry::new();
        let first = registry.publish(save_event()).event_id;
        let second = registry.publish(save_event()).event_id;
        assert_eq!(second, first + 1);
    }

    #[tokio::test]
    async fn watchers_receive_envelopes() {
        let registry = SubscriberRegistry::with_capacity(4);
        let mut stream = registry.watch();
        let report = registry.publish(ConfigEvent::Change {
            path: "audio.volume".into(),
            value: json!(0.3),
            old_value: Some(json!(0.8)),
        });

        let envelope = stream
            .next()
            .await
            .expect("stream item")
            .expect("broadcast ok");
        assert_eq!(envelope.id, report.event_id);
        assert!(matches!(envelope.event, ConfigEvent::Change { .. }));
    }
}
