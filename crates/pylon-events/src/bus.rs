//! The local event bus: listener registration and in-process dispatch.

use dashmap::DashMap;
use futures::future::BoxFuture;
use pylon_core::{BusEvent, EventName, EventPayload, PylonResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, warn};

use crate::transport::EventTransport;

/// A listener registered for a named event.
///
/// Returns a `PylonResult` rather than panicking on failure; either way, a
/// listener that fails never stops other listeners for the same event from
/// running, and never propagates out of [`EventBus::fire`].
pub type EventHandler = Arc<dyn Fn(BusEvent) -> BoxFuture<'static, PylonResult<()>> + Send + Sync>;

struct Subscription {
    id: u64,
    handler: EventHandler,
}

/// In-process event bus.
///
/// Listeners for a given event name are called in registration order. Each
/// call runs in its own spawned task so a panicking listener can't corrupt
/// or block delivery to the others — the panic is caught, logged, and
/// treated the same as a listener returning an error. [`EventBus`] carries
/// an [`EventTransport`] selection, but [`EventBus::fire`] only ever
/// dispatches to this node's own listeners: cross-node republishing onto a
/// configured broker is not implemented (the broker client is an external
/// collaborator — see [`crate::transport`]), so a non-`Local` transport
/// today behaves exactly like `Local`.
pub struct EventBus {
    transport: EventTransport,
    listeners: DashMap<EventName, Vec<Subscription>>,
    next_subscription_id: AtomicU64,
}

/// Handle returned by [`EventBus::subscribe`], used to unregister later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

impl EventBus {
    /// Creates a bus backed by the given transport.
    ///
    /// A non-`Local` transport is recorded but not connected to: fan-out
    /// stays local-only regardless, so this logs a warning rather than
    /// silently degrading an operator's expectation of cross-node delivery.
    pub fn new(transport: EventTransport) -> Self {
        if transport != EventTransport::Local {
            warn!(
                transport = transport.as_str(),
                "configured event transport is not wired to a real broker; events stay local-only"
            );
        }
        Self {
            transport,
            listeners: DashMap::new(),
            next_subscription_id: AtomicU64::new(0),
        }
    }

    /// Registers a listener for `name`, returning a handle that can later
    /// be passed to [`EventBus::unsubscribe`].
    pub fn subscribe(&self, name: impl Into<EventName>, handler: EventHandler) -> SubscriptionId {
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entry(name.into())
            .or_default()
            .push(Subscription { id, handler });
        SubscriptionId(id)
    }

    /// Removes a previously registered listener.
    pub fn unsubscribe(&self, name: &str, subscription: SubscriptionId) {
        if let Some(mut entry) = self.listeners.get_mut(name) {
            entry.retain(|sub| sub.id != subscription.0);
        }
    }

    /// Fires `name` with `payload` to every local listener, in registration
    /// order, isolating each listener's failure from the rest.
    pub async fn fire(&self, name: impl Into<EventName>, payload: EventPayload) {
        let name = name.into();
        let event = BusEvent::new(name.clone(), payload);

        let handlers: Vec<EventHandler> = match self.listeners.get(&name) {
            Some(subs) => subs.iter().map(|sub| sub.handler.clone()).collect(),
            None => Vec::new(),
        };

        for handler in handlers {
            let event = event.clone();
            let outcome = tokio::spawn(async move { handler(event).await }).await;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(event = %name, error = %err, "event listener returned an error");
                }
                Err(join_err) => {
                    error!(event = %name, error = %join_err, "event listener panicked");
                }
            }
        }
    }

    /// The transport this bus was configured with.
    pub fn transport(&self) -> EventTransport {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn ok_handler(counter: Arc<AtomicUsize>) -> EventHandler {
        Arc::new(move |_event| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn delivers_to_all_listeners_in_registration_order() {
        let bus = EventBus::new(EventTransport::Local);
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = order.clone();
            bus.subscribe(
                "demo",
                Arc::new(move |_event| {
                    let order = order.clone();
                    Box::pin(async move {
                        order.lock().push(tag);
                        Ok(())
                    })
                }),
            );
        }

        bus.fire("demo", serde_json::json!({})).await;
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn listener_panic_does_not_stop_other_listeners() {
        let bus = EventBus::new(EventTransport::Local);
        let counter = Arc::new(AtomicUsize::new(0));

        bus.subscribe(
            "demo",
            Arc::new(|_event| Box::pin(async move { panic!("boom") })),
        );
        bus.subscribe("demo", ok_handler(counter.clone()));

        bus.fire("demo", serde_json::json!({})).await;
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new(EventTransport::Local);
        let counter = Arc::new(AtomicUsize::new(0));
        let sub = bus.subscribe("demo", ok_handler(counter.clone()));

        bus.fire("demo", serde_json::json!({})).await;
        bus.unsubscribe("demo", sub);
        bus.fire("demo", serde_json::json!({})).await;

        assert_eq!(counter.load(AtomicOrdering::SeqCst), 1);
    }
}
