//! The exposure fabric: advertises this node's owned URL prefixes to the
//! cluster, forwards inbound requests on prefixes owned by other nodes, and
//! periodically checks peer liveness.

use async_trait::async_trait;
use pylon_config::ExposureConfig;
use pylon_core::Context;
use pylon_events::EventBus;
use pylon_rpc::{RpcFunction, RpcManager};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ExposureError, ExposureResult};
use crate::registry::ExposureRegistry;
use crate::request::{ForwardedRequest, ForwardedResponse};

/// Answers a forwarded request against this node's own local application.
///
/// The host binary implements this once, wrapping whatever web framework
/// it embeds; `pylon-exposure` never touches the framework directly,
/// mirroring how `exposure.py::wsgi_call` only ever calls
/// `context.app.wsgi_app(...)`.
#[async_trait]
pub trait LocalRequestHandler: Send + Sync {
    /// Handles a request forwarded from a peer, or a local catch-all miss,
    /// against this node's own application.
    async fn handle(&self, request: ForwardedRequest) -> ForwardedResponse;
}

/// Answers a forwarded Socket.IO-style event against this node's own
/// handlers.
#[async_trait]
pub trait LocalSioHandler: Send + Sync {
    /// Triggers `event` in `namespace` with `args` against local SIO
    /// handlers.
    async fn handle(&self, event: String, namespace: String, args: Value);
}

/// Advertises this node's exposure to the cluster and forwards requests to
/// peers that own a URL prefix this node doesn't serve locally.
///
/// Grounded end to end on `exposure.py`: the `<id>_ping` /
/// `<id>_wsgi_call` / `<id>_sio_call` RPC triple, the `pylon_exposed` /
/// `pylon_unexposed` event pair, and the announcer/liveness-checker
/// background thread pair, reframed here as two `tokio::spawn`ed tasks
/// observing [`Context::stop_event`].
pub struct ExposureFabric {
    context: Arc<Context>,
    rpc: Arc<RpcManager>,
    events: Arc<EventBus>,
    config: ExposureConfig,
    exposure_id: String,
    registry: Arc<ExposureRegistry>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl ExposureFabric {
    /// Creates a new, unexposed fabric for this node.
    pub fn new(
        context: Arc<Context>,
        rpc: Arc<RpcManager>,
        events: Arc<EventBus>,
        config: ExposureConfig,
    ) -> Arc<Self> {
        let exposure_id = format!("pylon_{}", context.id);
        Arc::new(Self {
            context,
            rpc,
            events,
            config,
            exposure_id,
            registry: Arc::new(ExposureRegistry::new()),
            tasks: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// This node's cluster-wide exposure identifier.
    pub fn exposure_id(&self) -> &str {
        &self.exposure_id
    }

    /// The registry of known peer exposures, for the handle-side router.
    pub fn registry(&self) -> &Arc<ExposureRegistry> {
        &self.registry
    }

    /// Registers this node's exposure RPC endpoints, announces it onto the
    /// event bus, and starts the periodic announcer. Skipped entirely when
    /// `context.before_reloader` is set.
    pub async fn expose(
        self: &Arc<Self>,
        handler: Arc<dyn LocalRequestHandler>,
        sio_handler: Arc<dyn LocalSioHandler>,
    ) {
        if self.context.before_reloader {
            info!("running before reloader started, skipping exposure");
            return;
        }

        info!(exposure_id = %self.exposure_id, "exposing pylon");

        let ping_id = format!("{}_ping", self.exposure_id);
        self.rpc.register_function(ping_id, ping_function());

        let wsgi_id = format!("{}_wsgi_call", self.exposure_id);
        self.rpc.register_function(wsgi_id, wsgi_call_function(Arc::clone(&handler)));

        let sio_id = format!("{}_sio_call", self.exposure_id);
        self.rpc.register_function(sio_id, sio_call_function(sio_handler));

        self.announce().await;

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_announcer().await });
        self.tasks.lock().push(handle);
    }

    /// Fires `pylon_exposed` with this node's id and URL prefix.
    async fn announce(&self) {
        self.events
            .fire(
                "pylon_exposed",
                json!({
                    "exposure_id": self.exposure_id,
                    "url_prefix": self.context.url_prefix,
                }),
            )
            .await;
    }

    async fn run_announcer(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.announce_interval_secs.max(1));
        loop {
            tokio::select! {
                _ = self.context.stop_event.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    self.announce().await;
                }
            }
        }
    }

    /// Unregisters this node's exposure, firing `pylon_unexposed` so peers
    /// drop it immediately rather than waiting for a liveness timeout.
    /// Skipped when `context.before_reloader` is set.
    pub async fn unexpose(&self) {
        if self.context.before_reloader {
            info!("running before reloader started, skipping unexposure");
            return;
        }

        info!(exposure_id = %self.exposure_id, "unexposing pylon");

        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }

        self.events
            .fire("pylon_unexposed", json!({"exposure_id": self.exposure_id}))
            .await;

        self.rpc.unregister_function(&format!("{}_sio_call", self.exposure_id));
        self.rpc.unregister_function(&format!("{}_wsgi_call", self.exposure_id));
        self.rpc.unregister_function(&format!("{}_ping", self.exposure_id));
    }

    /// Subscribes this node as a handler of `pylon_exposed` /
    /// `pylon_unexposed`, populating [`ExposureFabric::registry`], and
    /// starts the liveness checker.
    pub fn handle(self: &Arc<Self>) {
        let registry = Arc::clone(&self.registry);
        let own_id = self.exposure_id.clone();
        self.events.subscribe(
            "pylon_exposed",
            Arc::new(move |event| {
                let registry = Arc::clone(&registry);
                let own_id = own_id.clone();
                Box::pin(async move {
                    on_pylon_exposed(&registry, &own_id, event.payload);
                    Ok(())
                })
            }),
        );

        let registry = Arc::clone(&self.registry);
        self.events.subscribe(
            "pylon_unexposed",
            Arc::new(move |event| {
                let registry = Arc::clone(&registry);
                Box::pin(async move {
                    on_pylon_unexposed(&registry, event.payload);
                    Ok(())
                })
            }),
        );

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run_liveness_checker().await });
        self.tasks.lock().push(handle);
    }

    async fn run_liveness_checker(self: Arc<Self>) {
        let tick = Duration::from_secs(1);
        loop {
            tokio::select! {
                _ = self.context.stop_event.cancelled() => break,
                _ = tokio::time::sleep(tick) => {
                    self.check_liveness_once().await;
                }
            }
        }
    }

    async fn check_liveness_once(&self) {
        let ping_interval = Duration::from_secs(self.config.ping_interval_secs.max(1));
        let ping_timeout = Duration::from_secs(self.config.ping_timeout_secs.max(1));

        for exposure_id in self.registry.known_ids() {
            let Some(liveness) = self.registry.liveness(&exposure_id) else {
                continue;
            };
            if liveness.last_ping.elapsed() < ping_interval {
                continue;
            }

            let ping_name = format!("{exposure_id}_ping");
            let result = self
                .rpc
                .call_function_with_timeout(&ping_name, ping_timeout, Value::Null)
                .await;

            match result {
                Ok(value) if value == json!(true) => {
                    debug!(peer = %exposure_id, "pylon ping ok");
                    self.registry.record_ping_success(&exposure_id);
                }
                other => {
                    if let Err(err) = other {
                        debug!(peer = %exposure_id, error = %err, "pylon ping failed");
                    } else {
                        debug!(peer = %exposure_id, "pylon ping returned an invalid result");
                    }

                    let missed = self.registry.record_ping_failure(&exposure_id).unwrap_or(0);
                    if missed >= self.config.max_missed_pings {
                        warn!(peer = %exposure_id, missed, "evicting unresponsive peer");
                        // Local-only eviction: no `pylon_unexposed` emitted,
                        // since the failure may be purely local to this node.
                        self.registry.unregister(&exposure_id);
                    }
                }
            }
            // Only one peer is checked per tick, matching
            // `LivenessChecker.run`'s `to_check.pop(0)` single-check-per-loop
            // pace.
            break;
        }
    }

    /// Forwards a request to whichever peer owns the longest matching
    /// prefix, returning its response. [`ExposureError::NoMatch`] maps to
    /// 404 at the HTTP layer; [`ExposureError::Timeout`] maps to 504.
    pub async fn forward(&self, request: ForwardedRequest) -> ExposureResult<ForwardedResponse> {
        let exposure_id = self
            .registry
            .lookup(&request.path)
            .ok_or(ExposureError::NoMatch)?;

        let timeout = Duration::from_secs(self.config.forward_timeout_secs.max(1));
        let wsgi_name = format!("{exposure_id}_wsgi_call");

        let payload = serde_json::to_value(&request).map_err(|err| {
            ExposureError::ForwardFailed(exposure_id.clone(), err.to_string())
        })?;

        let result = self
            .rpc
            .call_function_with_timeout(&wsgi_name, timeout, payload)
            .await;

        match result {
            Ok(value) => serde_json::from_value(value)
                .map_err(|err| ExposureError::ForwardFailed(exposure_id.clone(), err.to_string())),
            Err(pylon_rpc::RpcError::Timeout(..)) => Err(ExposureError::Timeout(exposure_id)),
            Err(err) => Err(ExposureError::ForwardFailed(exposure_id, err.to_string())),
        }
    }

    /// Forwards a Socket.IO-style event to every currently-registered peer,
    /// best-effort: a failure is logged and does not stop delivery to the
    /// rest (mirrors `on_sio`'s per-peer `try/except`).
    pub async fn forward_sio(&self, event: &str, namespace: &str, args: Value) {
        let timeout = Duration::from_secs(self.config.sio_call_timeout_secs.max(1));
        for exposure_id in self.registry.known_ids() {
            let sio_name = format!("{exposure_id}_sio_call");
            let payload = json!({"event": event, "namespace": namespace, "args": args});
            if let Err(err) = self
                .rpc
                .call_function_with_timeout(&sio_name, timeout, payload)
                .await
            {
                error!(peer = %exposure_id, error = %err, "failed to forward SIO exposure event");
            }
        }
    }
}

fn ping_function() -> RpcFunction {
    Arc::new(|_args| Box::pin(async move { Ok(json!(true)) }))
}

fn wsgi_call_function(handler: Arc<dyn LocalRequestHandler>) -> RpcFunction {
    Arc::new(move |args| {
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let request: ForwardedRequest =
                serde_json::from_value(args).map_err(|err| err.to_string())?;
            let response = handler.handle(request).await;
            serde_json::to_value(response).map_err(|err| err.to_string())
        })
    })
}

fn sio_call_function(handler: Arc<dyn LocalSioHandler>) -> RpcFunction {
    Arc::new(move |args| {
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let event = args.get("event").and_then(Value::as_str).unwrap_or_default().to_string();
            let namespace = args
                .get("namespace")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let call_args = args.get("args").cloned().unwrap_or(Value::Null);
            handler.handle(event, namespace, call_args).await;
            Ok(Value::Null)
        })
    })
}

fn on_pylon_exposed(registry: &ExposureRegistry, own_id: &str, payload: Value) {
    let (Some(exposure_id), Some(url_prefix)) = (
        payload.get("exposure_id").and_then(Value::as_str),
        payload.get("url_prefix").and_then(Value::as_str),
    ) else {
        return;
    };

    if exposure_id == own_id {
        return;
    }

    registry.register(url_prefix, exposure_id);
}

fn on_pylon_unexposed(registry: &ExposureRegistry, payload: Value) {
    let Some(exposure_id) = payload.get("exposure_id").and_then(Value::as_str) else {
        return;
    };
    registry.unregister(exposure_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pylon_events::EventTransport;
    use pylon_rpc::{NoopSessionScope, RpcTransport};

    struct EchoHandler;

    #[async_trait]
    impl LocalRequestHandler for EchoHandler {
        async fn handle(&self, request: ForwardedRequest) -> ForwardedResponse {
            ForwardedResponse::text(200, format!("echo:{}", request.path))
        }
    }

    struct NoopSio;

    #[async_trait]
    impl LocalSioHandler for NoopSio {
        async fn handle(&self, _event: String, _namespace: String, _args: Value) {}
    }

    fn fabric(node_name: &str) -> Arc<ExposureFabric> {
        let context = Context::new(node_name);
        let rpc = RpcManager::new(
            RpcTransport::Local,
            Duration::from_secs(5),
            Arc::new(NoopSessionScope),
        );
        let events = Arc::new(EventBus::new(EventTransport::Local));
        ExposureFabric::new(context, rpc, events, ExposureConfig::default())
    }

    #[tokio::test]
    async fn forward_without_registry_entry_is_no_match() {
        let fabric = fabric("node-y");
        let request = ForwardedRequest {
            method: "GET".to_string(),
            path: "/foo/bar".to_string(),
            query: String::new(),
            headers: vec![],
            body: vec![],
        };
        let err = fabric.forward(request).await.unwrap_err();
        assert!(matches!(err, ExposureError::NoMatch));
    }

    #[tokio::test]
    async fn exposed_node_is_forwarded_to_by_its_prefix() {
        let fabric_x = fabric("node-x");
        fabric_x
            .expose(Arc::new(EchoHandler), Arc::new(NoopSio))
            .await;

        // Share the same underlying RPC manager with node Y so the call
        // actually dispatches in this in-process test, the way a shared
        // broker would across real nodes.
        let context_y = Context::new("node-y");
        let events_y = Arc::new(EventBus::new(EventTransport::Local));
        let fabric_y = ExposureFabric::new(
            context_y,
            Arc::clone(&fabric_x_rpc(&fabric_x)),
            events_y,
            ExposureConfig::default(),
        );
        fabric_y.handle();

        fabric_y.registry().register("/foo", fabric_x.exposure_id());

        let request = ForwardedRequest {
            method: "GET".to_string(),
            path: "/foo/bar".to_string(),
            query: "x=1".to_string(),
            headers: vec![],
            body: vec![],
        };
        let response = fabric_y.forward(request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(String::from_utf8(response.body).unwrap(), "echo:/foo/bar");
    }

    // Test-only accessor: reaches into the fabric to share its RPC manager.
    fn fabric_x_rpc(fabric: &Arc<ExposureFabric>) -> Arc<RpcManager> {
        Arc::clone(&fabric.rpc)
    }
}
