//! The transportable request/response pair forwarded over RPC between
//! nodes, replacing the original's raw WSGI `environ` dict.
//!
//! Grounded on `exposure.py::prepare_rpc_environ`: the original strips
//! non-serializable WSGI keys (the raw socket, the ASGI send/receive
//! callables, `wsgi.errors`) and reads the request body into bytes before
//! handing the environ to `call_with_timeout`. The rewrite's equivalent is
//! building a plain, fully-owned, serializable value up front rather than
//! filtering an framework-specific dict — there is nothing non-serializable
//! to strip because the model never carries a live connection handle.

use serde::{Deserialize, Serialize};

/// A forwardable HTTP request, built from the local framework's request
/// before handing it to the owning peer's exposure RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardedRequest {
    /// HTTP method, e.g. `"GET"`.
    pub method: String,
    /// The request's full, unmodified path, forwarded byte-for-byte to the
    /// owning peer exactly as the original forwards its entire unmodified
    /// `environ`/`PATH_INFO` — the matched prefix is not stripped.
    pub path: String,
    /// Raw query string, without a leading `?`.
    pub query: String,
    /// Request headers, in receive order. Multi-valued headers appear as
    /// repeated entries, as `http::HeaderMap` iteration already yields them.
    pub headers: Vec<(String, String)>,
    /// Full request body.
    pub body: Vec<u8>,
}

/// The response an exposure's `<id>_wsgi_call` RPC target returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, in the order the local app emitted them.
    pub headers: Vec<(String, String)>,
    /// Full response body.
    pub body: Vec<u8>,
}

impl ForwardedResponse {
    /// Builds a plain-text response with a given status and body.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: body.into().into_bytes(),
        }
    }
}
