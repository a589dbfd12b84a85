//! RPC error types.

use thiserror::Error;

/// Errors raised registering, calling, or dispatching RPC functions.
#[derive(Debug, Error, Clone)]
pub enum RpcError {
    /// No function is registered under this name.
    #[error("no RPC function registered as '{0}'")]
    NotFound(String),

    /// The call did not complete within its configured or requested timeout.
    ///
    /// Distinct from [`RpcError::Transport`]: a caller
    /// forwarding this over HTTP maps it to a 504, not a generic failure.
    #[error("RPC call to '{0}' timed out after {1:?}")]
    Timeout(String, std::time::Duration),

    /// The underlying transport (broker connection, remote dispatch) failed.
    #[error("RPC transport error calling '{0}': {1}")]
    Transport(String, String),

    /// The target function itself returned an error.
    #[error("RPC function '{0}' failed: {1}")]
    Failed(String, String),
}

/// Result alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;
