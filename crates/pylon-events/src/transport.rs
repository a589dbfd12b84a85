//! Transport selection for cross-node event delivery.
//!
//! A node always delivers events to its own local listeners. [`EventTransport`]
//! only records *which* broker a node is configured to use — it picks
//! RabbitMQ over Redis over local-only the way the original event node's
//! provider cascade does, matching the original host's behavior of falling
//! back to local-only when no broker (or an unreachable one) is configured.
//! Actually connecting to that broker and republishing fired events onto it
//! is out of scope for this crate: the broker client is an external
//! collaborator, and [`crate::EventBus::fire`] only ever dispatches to this
//! node's own listeners regardless of which transport is selected here. A
//! node configured with `Rabbitmq` or `Redis` gets local-only delivery,
//! identical to `Local`, until that wiring is added.

use pylon_config::BrokerConfig;

/// The transport backing cross-node event delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTransport {
    /// No broker; events only reach listeners on this node.
    Local,
    /// AMQP (RabbitMQ) broker.
    Rabbitmq,
    /// Redis pub/sub broker.
    Redis,
}

impl EventTransport {
    /// Selects a transport from broker configuration, preferring RabbitMQ
    /// over Redis when both are configured, matching the original event
    /// node's provider cascade.
    pub fn select(config: &BrokerConfig) -> Self {
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
        let config = BrokerConfig::default();
        assert_eq!(EventTransport::select(&config), EventTransport::Local);
    }

    #[test]
    fn prefers_rabbitmq_over_redis() {
        let config = BrokerConfig {
            rabbitmq: Some(AmqpConfig::default()),
            redis: Some(RedisConfig::default()),
        };
        assert_eq!(EventTransport::select(&config), EventTransport::Rabbitmq);
    }

    #[test]
    fn falls_back_to_redis_without_rabbitmq() {
        let config = BrokerConfig {
            rabbitmq: None,
            redis: Some(RedisConfig::default()),
        };
        assert_eq!(EventTransport::select(&config), EventTransport::Redis);
    }
}
