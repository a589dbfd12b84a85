//! Named, string-returning template extension points ("slots") whose
//! callbacks are registered locally but replicated cluster-wide.
//!
//! A slot callback registered on any node becomes callable from every node:
//! registration publishes a `register_slot_callback` event every node
//! listens for, and invocation always goes through RPC, never a direct
//! local call, even when the callback happens to live on the same node
//! that's running the slot.

pub mod manager;

pub use manager::SlotManager;
