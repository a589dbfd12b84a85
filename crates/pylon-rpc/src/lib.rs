//! Named RPC registration, remote invocation, and the `call.<name>` proxy
//! surface shared across the Pylon host and its plugins.
//!
//! An [`RpcManager`] holds the registry of callable functions and dispatches
//! calls to them with a timeout, exactly as the original host's
//! `arbiter.RpcNode` does over its broker transport. A [`RpcProxy`] is the
//! idiomatic replacement for the source's dynamic `mgr.call.<name>(...)`
//! attribute proxy.

pub mod error;
pub mod manager;
pub mod session;
pub mod transport;

pub use error::{RpcError, RpcResult};
pub use manager::{RpcFunction, RpcManager, RpcProxy, log_dispatch_error};
pub use session::{NoopSessionScope, SessionScope};
pub use transport::RpcTransport;
