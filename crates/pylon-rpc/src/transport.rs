//! Transport selection for cross-node RPC dispatch.
//!
//! Mirrors `pylon_events::EventTransport`'s selection cascade — RPC and the
//! event bus share the same broker family in the original host
//! (`arbiter.RpcNode` wraps the same `EventNode` the event manager builds),
//! so a node configured with a broker exposes registered functions to every
//! peer sharing it; one with none only serves calls made from within this
//! process.

use pylon_config::RpcConfig;

/// The transport backing cross-node RPC dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcTransport {
    /// No broker; only functions registered on this node are callable.
    Local,
    /// AMQP (RabbitMQ) broker.
    Rabbitmq,
    /// Redis pub/sub broker.
    Redis,
}

impl RpcTransport {
    /// Selects a transport from RPC configuration, preferring RabbitMQ over
    /// Redis when both are configured.
    pub fn select(config: &RpcConfig) -> Self {
        if config.rabbitmq.is_some() {
            Self::Rabbitmq
        } else if config.redis.is_some() {
            Self::Redis
        } else {
            Self::Local
        }
    }

    /// Human-readable name used in log messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Rabbitmq => "rabbitmq",
            Self::Redis => "redis",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pylon_config::{AmqpConfig, RedisConfig};

    #[test]
    fn selects_local_with_no_broker_configured() {
        assert_eq!(RpcTransport::select(&RpcConfig::default()), RpcTransport::Local);
    }

    #[test]
    fn prefers_rabbitmq_over_redis() {
        let config = RpcConfig {
            rabbitmq: Some(AmqpConfig::default()),
            redis: Some(RedisConfig::default()),
            default_timeout_secs: 30,
        };
        assert_eq!(RpcTransport::select(&config), RpcTransport::Rabbitmq);
    }
}
