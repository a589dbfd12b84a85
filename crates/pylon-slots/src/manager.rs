//! The slot manager: named, string-returning template extension points
//! whose callbacks are replicated cluster-wide.

use dashmap::DashMap;
use parking_lot::Mutex;
use pylon_core::Context;
use pylon_rpc::{RpcFunction, RpcManager};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error};

/// Per-slot state: the ordered list of cluster-wide RPC names registered
/// for it, in registration order (this order must be preserved
/// exactly, never re-sorted).
type SlotCallbacks = DashMap<String, Mutex<Vec<String>>>;

/// Manages named template slots: registration (replicated across the
/// cluster via the event bus) and invocation (via RPC, so a slot callback
/// registered on any node is reachable from every node).
///
/// Grounded on `slot.py::SlotManager`: `register_callback` derives a
/// cluster-wide-unique RPC name, registers it locally, and fires
/// `register_slot_callback` so every node (including this one) appends it
/// to its local `callbacks` map via the event listener — the same node
/// that registers a callback learns about it through the event bus loop,
/// not a direct local write, exactly as the original does.
pub struct SlotManager {
    context: Arc<Context>,
    rpc: Arc<RpcManager>,
    events: Arc<pylon_events::EventBus>,
    callbacks: Arc<SlotCallbacks>,
}

impl SlotManager {
    /// Creates a slot manager and subscribes it to the cluster-wide
    /// `register_slot_callback` / `unregister_slot_callback` events.
    pub fn new(
        context: Arc<Context>,
        rpc: Arc<RpcManager>,
        events: Arc<pylon_events::EventBus>,
    ) -> Arc<Self> {
        let callbacks: Arc<SlotCallbacks> = Arc::new(DashMap::new());

        let register_callbacks = Arc::clone(&callbacks);
        events.subscribe(
            "register_slot_callback",
            Arc::new(move |event| {
                let callbacks = Arc::clone(&register_callbacks);
                Box::pin(async move {
                    on_register_slot_callback(&callbacks, event.payload);
                    Ok(())
                })
            }),
        );

        // `unregister_slot_callback` is subscribed for symmetry with the
        // core-owned event pair, but the original's `unregister_callback`
        // never actually fires it — the listener exists so a future caller
        // that does fire the event is still honored, not because anything
        // emits it today.
        let unregister_callbacks = Arc::clone(&callbacks);
        events.subscribe(
            "unregister_slot_callback",
            Arc::new(move |event| {
                let callbacks = Arc::clone(&unregister_callbacks);
                Box::pin(async move {
                    on_unregister_slot_callback(&callbacks, event.payload);
                    Ok(())
                })
            }),
        );

        Arc::new(Self {
            context,
            rpc,
            events,
            callbacks,
        })
    }

    /// Registers `callback` under `slot`, deriving a cluster-wide-unique
    /// RPC name from this node's name plus `qualifier` (the equivalent of
    /// the original's `module.class.function` path, flattened by the
    /// caller since Rust has no runtime introspection of a closure's
    /// origin).
    pub async fn register_callback(&self, slot: &str, qualifier: &str, callback: RpcFunction) {
        let callback_name = format!("{}_{}", self.context.node_name, qualifier).replace('.', "_");
        self.rpc.register_function(callback_name.clone(), callback);
        self.events
            .fire(
                "register_slot_callback",
                json!({"slot": slot, "callback": callback_name}),
            )
            .await;
    }

    /// Unregisters a slot callback.
    ///
    /// Intentionally a no-op, matching `slot.py::unregister_callback`:
    /// registration is effectively append-only unless a caller fires
    /// `unregister_slot_callback` directly on the event bus.
    pub fn unregister_callback(&self, _slot: &str, _callback: &str) {}

    /// Runs every callback registered for `slot`, in registration order,
    /// concatenating non-empty string results with `\n`. A callback
    /// that errors or returns a non-string value is logged and skipped —
    /// it never aborts the remaining callbacks (same isolation guarantee
    /// as event listeners).
    pub async fn run_slot(&self, slot: &str, payload: Value) -> String {
        let names: Vec<String> = match self.callbacks.get(slot) {
            Some(entry) => entry.lock().clone(),
            None => return String::new(),
        };

        let mut results = Vec::new();
        for name in names {
            match self
                .rpc
                .call_function(&name, json!([slot, payload.clone()]))
                .await
            {
                Ok(Value::Null) => {}
                Ok(Value::String(text)) => {
                    if !text.is_empty() {
                        results.push(text);
                    }
                }
                Ok(other) => results.push(other.to_string()),
                Err(err) => {
                    error!(slot = %slot, callback = %name, error = %err, "slot callback failed");
                }
            }
        }
        results.join("\n")
    }
}

fn on_register_slot_callback(callbacks: &SlotCallbacks, payload: Value) {
    let (Some(slot), Some(callback)) = (
        payload.get("slot").and_then(Value::as_str),
        payload.get("callback").and_then(Value::as_str),
    ) else {
        error!("invalid slot registration payload, skipping");
        return;
    };

    debug!(slot = %slot, callback = %callback, "new slot callback");
    let mut entry = callbacks.entry(slot.to_string()).or_default();
    if !entry.lock().iter().any(|existing| existing == callback) {
        entry.lock().push(callback.to_string());
    }
}

fn on_unregister_slot_callback(callbacks: &SlotCallbacks, payload: Value) {
    let (Some(slot), Some(callback)) = (
        payload.get("slot").and_then(Value::as_str),
        payload.get("callback").and_then(Value::as_str),
    ) else {
        error!("invalid slot unregistration payload, skipping");
        return;
    };

    if let Some(entry) = callbacks.get(slot) {
        entry.lock().retain(|existing| existing != callback);
    }
}
