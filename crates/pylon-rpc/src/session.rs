//! Per-call database session scoping.
//!
//! The original host wraps every dispatched RPC function in
//! `db_support.create_local_session()` / `close_local_session()`, relying on
//! an implicit thread-local session. The storage engine itself is out of
//! scope, but the *scope lifecycle* — open before dispatch,
//! commit-or-rollback and close after — is, so it is modeled here as a
//! pluggable trait the host injects. A no-op implementation is the default
//! for hosts without a configured database.

use async_trait::async_trait;

/// Opens and closes a per-call session scope around RPC dispatch.
///
/// Implementations are responsible for making the session available to the
/// dispatched function through whatever means their storage layer uses
/// (thread-local, task-local, or an explicit argument); `pylon-rpc` only
/// guarantees `begin` runs immediately before dispatch and `end` runs
/// immediately after, exactly once, regardless of whether dispatch
/// succeeded.
#[async_trait]
pub trait SessionScope: Send + Sync {
    /// Opens a new session scope, nesting inside an already-open one if the
    /// call is itself dispatched from within another scope.
    async fn begin(&self);

    /// Commits the scope's session if it is still active, rolls back
    /// otherwise, then closes it.
    async fn end(&self, succeeded: bool);
}

/// A session scope that does nothing, for hosts with no database configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionScope;

#[async_trait]
impl SessionScope for NoopSessionScope {
    async fn begin(&self) {}
    async fn end(&self, _succeeded: bool) {}
}
