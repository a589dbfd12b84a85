//! Event bus for local and cross-node plugin notifications.
//!
//! Events are name + JSON payload pairs (see [`pylon_core::BusEvent`])
//! delivered to every listener registered for that name, in registration
//! order. A listener erroring or panicking never stops delivery to the
//! others, and never propagates back to the caller of
//! [`EventBus::fire`].

pub mod bus;
pub mod error;
pub mod transport;

pub use bus::{EventBus, EventHandler, SubscriptionId};
pub use error::{EventBusError, EventBusResult};
pub use transport::EventTransport;
