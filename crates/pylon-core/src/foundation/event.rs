//! Shared event vocabulary used by the event bus, slot manager, and RPC layer.
//!
//! Pylon events are name + JSON payload pairs rather than a typed hierarchy —
//! any subsystem can fire an event under any name, and listeners receive the
//! raw payload. This is deliberately looser than the typed `Event` trait this
//! crate's ancestor used for strongly-typed message events, since plugins here
//! are independent, arbitrarily-versioned bundles rather than crates compiled
//! against a shared type.

use serde_json::Value;

/// The name an event is fired and listened for under.
pub type EventName = String;

/// The JSON payload carried by an event.
pub type EventPayload = Value;

/// A single fired event, as delivered to a listener.
#[derive(Debug, Clone)]
pub struct BusEvent {
    /// The event's name.
    pub name: EventName,
    /// The event's payload.
    pub payload: EventPayload,
}

impl BusEvent {
    /// Creates a new event.
    pub fn new(name: impl Into<EventName>, payload: EventPayload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}
