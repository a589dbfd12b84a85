//! Core context, error, and event vocabulary shared by every Pylon crate.
//!
//! `pylon-core` has no knowledge of plugins, RPC, or the exposure fabric —
//! those live in their own crates and all depend on the types defined here.

pub mod foundation;

pub use foundation::context::Context;
pub use foundation::error::{ContextError, ContextResult, PylonError, PylonResult};
pub use foundation::event::{BusEvent, EventName, EventPayload};
