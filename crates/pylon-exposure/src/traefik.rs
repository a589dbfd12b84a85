//! The reverse-proxy registrar: writes this node's router/service (and
//! optional forward-auth middleware) records into a shared Traefik KV store
//! so an external edge proxy can route to it, and removes exactly those
//! keys again on shutdown.
//!
//! Grounded on `pylon/core/tools/traefik.py`, which writes a fixed key set
//! under a configured root and deletes the same set it wrote at shutdown.
//! Skipped entirely when no `traefik.redis` is configured,
//! or when `context.before_reloader` is set (the parent process of a
//! dev-mode reload pair never owns the registration).

use parking_lot::Mutex;
use pylon_config::TraefikConfig;
use pylon_core::Context;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ExposureError, ExposureResult};

/// Writes and removes this node's Traefik KV records.
///
/// Holds every key it has written so shutdown deletes exactly that set,
/// never more, never less — holding even across repeated
/// register/unregister cycles (e.g. a hot reload that re-registers).
pub struct ReverseProxyRegistrar {
    context: Arc<Context>,
    config: TraefikConfig,
    written_keys: Mutex<Vec<String>>,
}

impl ReverseProxyRegistrar {
    /// Creates a new, not-yet-registered registrar for this node.
    pub fn new(context: Arc<Context>, config: TraefikConfig) -> Self {
        Self {
            context,
            config,
            written_keys: Mutex::new(Vec::new()),
        }
    }

    /// Returns `true` if this node has anything to register: a KV backend
    /// is configured and this process is not the pre-reload parent.
    pub fn enabled(&self) -> bool {
        self.config.redis.is_some() && !self.context.before_reloader
    }

    /// Writes this node's router, service, and optional forward-auth
    /// middleware records. A no-op when [`ReverseProxyRegistrar::enabled`]
    /// is `false`.
    pub async fn register(&self) -> ExposureResult<()> {
        if !self.enabled() {
            info!("traefik registration skipped: no KV configured or running before reloader");
            return Ok(());
        }

        let mut conn = self.connect().await?;
        let root = self.config.rootkey.trim_end_matches('/');
        let node = &self.context.node_name;

        let mut entries: Vec<(String, String)> = vec![
            (
                format!("{root}/http/services/{node}/loadbalancer/servers/0/url"),
                self.config.node_url.clone(),
            ),
            (
                format!("{root}/http/routers/{node}/rule"),
                self.config.rule.clone(),
            ),
            (
                format!("{root}/http/routers/{node}/service"),
                node.clone(),
            ),
        ];

        for (idx, entrypoint) in self.config.entrypoints.iter().enumerate() {
            entries.push((
                format!("{root}/http/routers/{node}/entrypoints/{idx}"),
                entrypoint.clone(),
            ));
        }
        for (idx, middleware) in self.config.middlewares.iter().enumerate() {
            entries.push((
                format!("{root}/http/routers/{node}/middlewares/{idx}"),
                middleware.clone(),
            ));
        }

        if let Some(address) = &self.config.forward_auth_address {
            entries.push((
                format!("{root}/http/middlewares/{node}/forwardauth/address"),
                address.clone(),
            ));
            for (idx, header) in self.config.forward_auth_response_headers.iter().enumerate() {
                entries.push((
                    format!("{root}/http/middlewares/{node}/forwardauth/authResponseHeaders/{idx}"),
                    header.clone(),
                ));
            }
        }

        for (key, value) in &entries {
            conn.set::<_, _, ()>(key, value)
                .await
                .map_err(|err| ExposureError::Kv(err.to_string()))?;
        }

        let written = entries.into_iter().map(|(key, _)| key).collect::<Vec<_>>();
        info!(node = %node, count = written.len(), "registered node with reverse proxy");
        *self.written_keys.lock() = written;
        Ok(())
    }

    /// Deletes exactly the keys written by the last successful
    /// [`ReverseProxyRegistrar::register`] call. Idempotent: calling it
    /// without a prior registration, or twice in a row, is a no-op.
    pub async fn unregister(&self) {
        let keys = std::mem::take(&mut *self.written_keys.lock());
        if keys.is_empty() {
            return;
        }

        let mut conn = match self.connect().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "could not reach traefik KV store to unregister node");
                return;
            }
        };

        for key in &keys {
            if let Err(err) = conn.del::<_, ()>(key).await {
                warn!(key = %key, error = %err, "failed to delete reverse-proxy KV key");
            }
        }
        info!(count = keys.len(), "unregistered node from reverse proxy");
    }

    async fn connect(&self) -> ExposureResult<ConnectionManager> {
        let redis_config = self
            .config
            .redis
            .as_ref()
            .ok_or_else(|| ExposureError::Kv("no traefik.redis configured".to_string()))?;

        let url = if redis_config.password.is_empty() {
            format!("redis://{}:{}", redis_config.host, redis_config.port)
        } else {
            format!(
                "redis://:{}@{}:{}",
                redis_config.password, redis_config.host, redis_config.port
            )
        };

        let client = redis::Client::open(url).map_err(|err| ExposureError::Kv(err.to_string()))?;
        client
            .get_connection_manager()
            .await
            .map_err(|err| ExposureError::Kv(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_redis_config() {
        let context = Context::new("node-a");
        let registrar = ReverseProxyRegistrar::new(context, TraefikConfig::default());
        assert!(!registrar.enabled());
    }

    #[tokio::test]
    async fn register_without_redis_config_is_a_noop() {
        let context = Context::new("node-a");
        let registrar = ReverseProxyRegistrar::new(context, TraefikConfig::default());
        registrar.register().await.unwrap();
        assert!(registrar.written_keys.lock().is_empty());
    }

    #[tokio::test]
    async fn unregister_without_prior_register_is_a_noop() {
        let context = Context::new("node-a");
        let registrar = ReverseProxyRegistrar::new(context, TraefikConfig::default());
        registrar.unregister().await;
    }

    #[test]
    fn redis_configured_enables_registration() {
        let context = Context::new("node-a");
        let mut config = TraefikConfig::default();
        config.redis = Some(pylon_config::RedisConfig::default());
        let registrar = ReverseProxyRegistrar::new(context, config);
        assert!(registrar.enabled());
    }
}
