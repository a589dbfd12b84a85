//! The process-wide [`Context`] passed explicitly through every Pylon API.
//!
//! Unlike the framework this crate is descended from, `Context` here is never
//! a thread-local or a process global — every subsystem constructor and every
//! plugin hook takes it as an explicit `Arc<Context>` argument.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{ContextError, ContextResult};

/// The host process's shared, explicit context.
///
/// Carries node identity, the cancellation token every background task
/// watches, and an attribute bag plugins use to stash arbitrary values that
/// don't warrant their own subsystem (the equivalent of setting attributes
/// directly on the original attribute-bag context object).
///
/// Handles to the individual subsystems (module manager, event bus, RPC
/// manager, slot manager, exposure fabric) are attached with
/// [`Context::attach`] once each subsystem is constructed, since several of
/// them need a reference to `Context` itself to construct.
pub struct Context {
    /// Stable per-node identifier: `{node_name}_{uuid}`.
    pub id: String,
    /// Operator-assigned name for this node, used as a namespace prefix for
    /// cluster-wide RPC/event names.
    pub node_name: String,
    /// URL prefix this node owns in the exposure fabric, if any.
    pub url_prefix: Option<String>,
    /// Whether the process was started in debug mode.
    pub debug: bool,
    /// Whether this process is the parent of a dev-mode auto-reload pair.
    ///
    /// Reverse-proxy registration and a handful of other one-time startup
    /// actions are skipped when this is `true`.
    pub before_reloader: bool,
    /// Cancelled once shutdown begins; every background task observes this
    /// at least once per second.
    pub stop_event: CancellationToken,
    attrs: DashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Context {
    /// Creates a new context for a node with the given name.
    pub fn new(node_name: impl Into<String>) -> Arc<Self> {
        let node_name = node_name.into();
        let id = format!("{node_name}_{}", Uuid::new_v4());
        Arc::new(Self {
            id,
            node_name,
            url_prefix: None,
            debug: false,
            before_reloader: false,
            stop_event: CancellationToken::new(),
            attrs: DashMap::new(),
        })
    }

    /// Sets an arbitrary attribute on the context.
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        self.attrs.insert(key.into(), Arc::new(value));
    }

    /// Reads an attribute, failing if it was never set or has a different type.
    ///
    /// Mirrors the original's `__getattr__`, which raises `AttributeError`
    /// for unset attributes rather than returning `None`.
    pub fn get<T: Send + Sync + 'static + Clone>(&self, key: &str) -> ContextResult<T> {
        let entry = self
            .attrs
            .get(key)
            .ok_or_else(|| ContextError::NotSet(key.to_string()))?;
        entry
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ContextError::WrongType(key.to_string()))
    }

    /// Returns `true` if an attribute has been set under this key.
    pub fn has(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// Requests shutdown: cancels [`Context::stop_event`].
    pub fn request_shutdown(&self) {
        self.stop_event.cancel();
    }

    /// Returns `true` once shutdown has been requested.
    pub fn is_stopping(&self) -> bool {
        self.stop_event.is_cancelled()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("node_name", &self.node_name)
            .field("url_prefix", &self.url_prefix)
            .field("debug", &self.debug)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_attribute_fails() {
        let ctx = Context::new("node-a");
        let err = ctx.get::<String>("missing").unwrap_err();
        assert!(matches!(err, ContextError::NotSet(_)));
    }

    #[test]
    fn set_then_get_roundtrips() {
        let ctx = Context::new("node-a");
        ctx.set("greeting", "hello".to_string());
        assert_eq!(ctx.get::<String>("greeting").unwrap(), "hello");
    }

    #[test]
    fn node_id_is_namespaced_by_name() {
        let ctx = Context::new("node-a");
        assert!(ctx.id.starts_with("node-a_"));
    }
}
