//! Exposure fabric error types.

use thiserror::Error;

/// Errors raised forwarding a request across the exposure fabric or
/// registering this node's routes with the reverse proxy.
#[derive(Debug, Error)]
pub enum ExposureError {
    /// No exposure entry matched the incoming request's path.
    #[error("no exposure registered for prefix matching this request")]
    NoMatch,

    /// The forwarded call to the owning peer did not complete in time.
    ///
    /// Surfaces as an HTTP 504 at the handler.
    #[error("exposure forward to '{0}' timed out")]
    Timeout(String),

    /// The RPC call to forward the request failed for a reason other than
    /// timeout.
    #[error("exposure forward to '{0}' failed: {1}")]
    ForwardFailed(String, String),

    /// The reverse-proxy KV store could not be reached.
    #[error("reverse-proxy KV store error: {0}")]
    Kv(String),
}

/// Result alias for exposure fabric operations.
pub type ExposureResult<T> = Result<T, ExposureError>;
