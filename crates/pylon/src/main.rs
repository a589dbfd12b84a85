//! The `pylon` host binary: loads configuration, wires a [`Supervisor`], and
//! serves its HTTP surface until a shutdown signal arrives.
//!
//! Owns exactly two responsibilities the library crates don't: parsing the
//! process's CLI flags and driving an axum `Router` (health endpoints plus
//! a catch-all that forwards unmatched requests through the exposure
//! fabric). Everything else is delegated to [`Supervisor`].

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::Router;
use clap::Parser;
use pylon_exposure::{ExposureFabric, ForwardedRequest, ForwardedResponse, LocalRequestHandler, LocalSioHandler};
use pylon_runtime::Supervisor;
use serde_json::Value;
use tracing::{error, info, warn};

/// Pylon: a clustered plugin-runtime host.
#[derive(Parser, Debug)]
#[command(name = "pylon", version, about = "Clustered plugin-runtime host")]
struct Cli {
    /// Path to a YAML configuration file, overriding search-path discovery.
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Increases log verbosity; pass twice for trace-level output.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Forwards an unmatched request to the node's own application.
///
/// The host binary owns no application of its own to dispatch to locally;
/// every request this node doesn't forward to a peer is a 404, matching a
/// node that runs `handle_enabled` but `expose: false` (a pure forwarder).
struct NotFoundHandler;

#[async_trait]
impl LocalRequestHandler for NotFoundHandler {
    async fn handle(&self, _request: ForwardedRequest) -> ForwardedResponse {
        ForwardedResponse::text(404, "no local application installed on this node")
    }
}

/// Drops Socket.IO-style events forwarded to this node, for the same reason
/// [`NotFoundHandler`] 404s: no embedded application owns them.
struct NoopSioHandler;

#[async_trait]
impl LocalSioHandler for NoopSioHandler {
    async fn handle(&self, _event: String, _namespace: String, _args: Value) {}
}

#[derive(Clone)]
struct AppState {
    exposure: Arc<ExposureFabric>,
}

async fn healthz() -> &'static str {
    "ok"
}

async fn livez() -> &'static str {
    "ok"
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.exposure.registry().known_ids().is_empty() {
        (StatusCode::OK, "no peers known yet")
    } else {
        (StatusCode::OK, "ready")
    }
}

/// Catch-all route: forwards any request not matched by a more specific
/// route to whichever peer owns its longest matching prefix.
async fn forward_catch_all(
    State(state): State<AppState>,
    method: axum::http::Method,
    uri: axum::http::Uri,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let request = ForwardedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().unwrap_or_default().to_string(),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        body: body.to_vec(),
    };

    match state.exposure.forward(request).await {
        Ok(response) => {
            let mut builder = axum::http::Response::builder().status(response.status);
            for (name, value) in response.headers {
                builder = builder.header(name, value);
            }
            builder
                .body(axum::body::Body::from(response.body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(pylon_exposure::ExposureError::NoMatch) => {
            (StatusCode::NOT_FOUND, "no node owns this path").into_response()
        }
        Err(pylon_exposure::ExposureError::Timeout(peer)) => {
            warn!(peer = %peer, "forward timed out");
            (StatusCode::GATEWAY_TIMEOUT, "peer timed out").into_response()
        }
        Err(err) => {
            error!(error = %err, "forward failed");
            (StatusCode::BAD_GATEWAY, "forward failed").into_response()
        }
    }
}

fn verbosity_filter(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(level) = verbosity_filter(cli.verbose) {
        // SAFETY: set once on the main thread before any other thread exists.
        unsafe {
            std::env::set_var("RUST_LOG", level);
        }
    }

    let config = match &cli.config {
        Some(path) => pylon_config::load_config_from_file(path),
        None => pylon_config::bootstrap_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = pylon_config::validate_config(&config) {
        eprintln!("invalid configuration: {err}");
        return ExitCode::FAILURE;
    }

    pylon_runtime::init_logging(&config.logging);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async_main(config))
}

async fn async_main(config: pylon_config::PylonConfig) -> ExitCode {
    let addr = format!("{}:{}", config.node.host, config.node.port);

    let supervisor = match Supervisor::bootstrap_default(config) {
        Ok(supervisor) => supervisor,
        Err(err) => {
            error!(error = %err, "failed to bootstrap pylon node");
            return ExitCode::FAILURE;
        }
    };

    supervisor
        .start(Arc::new(NotFoundHandler), Arc::new(NoopSioHandler))
        .await;

    let state = AppState {
        exposure: Arc::clone(&supervisor.exposure),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .fallback(any(forward_catch_all))
        .with_state(state);

    let socket_addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(addr = %addr, error = %err, "invalid bind address");
            supervisor.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(socket_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %socket_addr, error = %err, "failed to bind HTTP listener");
            supervisor.shutdown().await;
            return ExitCode::FAILURE;
        }
    };

    info!(addr = %socket_addr, "serving HTTP");

    let shutdown_supervisor = Arc::clone(&supervisor);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_supervisor.run_until_shutdown().await;
    });

    if let Err(err) = server.await {
        error!(error = %err, "HTTP server exited with an error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
