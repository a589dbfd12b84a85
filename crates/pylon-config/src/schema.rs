//! Configuration schema for the Pylon host process.
//!
//! # Configuration Hierarchy
//!
//! ```text
//! PylonConfig
//! ├── node: NodeConfig             # node identity / networking
//! ├── logging: LoggingConfig       # logging settings
//! ├── modules: ModulesConfig       # plugin/requirements/config provider selection
//! ├── events: BrokerConfig         # event bus transport
//! ├── rpc: RpcConfig               # RPC transport
//! ├── socketio: SocketIoConfig     # Socket.IO-compatible client/server settings
//! ├── traefik: TraefikConfig       # reverse-proxy KV registrar
//! └── exposure: ExposureConfig     # peer exposure fabric
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration structure for the Pylon host.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PylonConfig {
    /// Node identity and HTTP bind settings.
    pub node: NodeConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Provider selection for plugin discovery, requirements, and config.
    pub modules: ModulesConfig,
    /// Event bus transport configuration.
    pub events: BrokerConfig,
    /// RPC transport configuration.
    pub rpc: RpcConfig,
    /// Socket.IO transport configuration, used by the exposure fabric to
    /// forward WS-style events between peers.
    pub socketio: SocketIoConfig,
    /// Reverse-proxy (Traefik) KV registrar configuration.
    pub traefik: TraefikConfig,
    /// Peer exposure fabric configuration.
    pub exposure: ExposureConfig,
}

/// Node identity and HTTP bind settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Operator-assigned node name, used to namespace cluster-wide RPC/event
    /// names and as the node's entry in the exposure registry.
    pub name: String,
    /// Address the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// URL prefix this node owns, if any (mutually exclusive with joining
    /// the exposure fabric as a pure forwarder).
    pub url_prefix: Option<String>,
    /// Enables debug mode (more verbose errors, relaxed timeouts).
    #[serde(default)]
    pub debug: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "pylon".to_string(),
            host: default_host(),
            port: 8080,
            url_prefix: None,
            debug: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level: trace, debug, info, warn, error.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Module-specific log level overrides.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            filters: HashMap::new(),
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Converts to a `tracing::Level`.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// Converts to a filter directive string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Provider selection for plugin discovery, requirements, and config storage.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModulesConfig {
    /// Root directory plugin bundles are discovered and unpacked under.
    pub base_path: String,
    /// Plugin discovery provider.
    pub plugins_provider: ProviderConfig,
    /// Requirements cache/install provider.
    pub requirements_provider: ProviderConfig,
    /// Module config provider.
    pub config_provider: ProviderConfig,
    /// Requirements install mode: relaxed, constrained, or strict.
    pub install_mode: InstallMode,
    /// Activation mode: bulk (prepend all site paths upfront) or steps
    /// (prepend incrementally, one plugin at a time).
    pub activation_mode: ActivationMode,
    /// Command used to install a plugin's requirements file into its
    /// per-plugin dependency directory. Defaults to `pip install`, but is
    /// fully pluggable since target plugins are not assumed to be Python.
    pub installer_command: Vec<String>,
    /// Command used to produce the frozen, fully-resolved requirement set
    /// installed under a plugin's site directory — only consulted under
    /// [`InstallMode::Strict`], where it constrains every later plugin.
    pub installer_freeze_command: Vec<String>,
    /// Per-plugin configuration overrides set by the host operator, layered
    /// between a plugin's own bundled `config.yml` defaults and the
    /// per-plugin custom config store: base ← global override ← custom.
    #[serde(default)]
    pub plugin_overrides: HashMap<String, serde_json::Value>,
    /// Plugins to activate during the preload phase, before the target
    /// phase's plugins are resolved.
    #[serde(default)]
    pub preload: Vec<String>,
    /// Plugin names never discovered or activated, even if present in the
    /// plugins provider.
    #[serde(default)]
    pub skip: Vec<String>,
}

/// A provider backend selector plus its raw JSON configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider backend type: `folder`, `git_http`, `object_store`, or `db`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Backend-specific settings.
    #[serde(default)]
    pub settings: serde_json::Value,
}

/// Requirements install mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    /// No constraints between plugins' requirements installs.
    #[default]
    Relaxed,
    /// Each plugin's own declared requirements file constrains later plugins.
    Constrained,
    /// The frozen installed closure constrains later plugins.
    Strict,
}

/// Module activation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivationMode {
    /// Prepend every plugin's site path upfront, before any module is activated.
    #[default]
    Bulk,
    /// Prepend site paths incrementally, one plugin at a time as it activates.
    Steps,
}

/// Event bus transport selection.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BrokerConfig {
    /// RabbitMQ transport settings, if configured.
    pub rabbitmq: Option<AmqpConfig>,
    /// Redis transport settings, if configured.
    pub redis: Option<RedisConfig>,
}

/// AMQP (RabbitMQ) broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmqpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub queue: String,
    pub use_ssl: bool,
}

impl Default for AmqpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            user: String::new(),
            password: String::new(),
            vhost: "carrier".to_string(),
            queue: "events".to_string(),
            use_ssl: false,
        }
    }
}

/// Redis broker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub queue: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            queue: "events".to_string(),
        }
    }
}

/// RPC transport configuration; reuses the event-bus broker types since RPC
/// and events share the same transport in practice.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RpcConfig {
    pub rabbitmq: Option<AmqpConfig>,
    pub redis: Option<RedisConfig>,
    /// RPC call timeout in seconds, used when the caller does not specify one.
    pub default_timeout_secs: u64,
}

/// Socket.IO transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SocketIoConfig {
    pub url: Option<String>,
    pub room: String,
}

/// Reverse-proxy (Traefik) KV registrar configuration.
///
/// Grounded on `pylon/core/tools/traefik.py`'s key list:
/// `{root}/http/services/{node}/...`, `{root}/http/routers/{node}/...`,
/// and the optional `{root}/http/middlewares/{node}/forwardauth/...` block.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TraefikConfig {
    /// Redis connection used as the Traefik KV store. Registration is
    /// skipped entirely when this is absent.
    pub redis: Option<RedisConfig>,
    /// KV key prefix every written key is rooted under (`{root}` above).
    pub rootkey: String,
    /// Router rule, e.g. `` PathPrefix(`/myapp`) ``.
    pub rule: String,
    /// Entrypoints the registered router should bind to.
    pub entrypoints: Vec<String>,
    /// Middleware names to attach to the registered router.
    pub middlewares: Vec<String>,
    /// URL this node is reachable at, written as the service's load-balancer target.
    pub node_url: String,
    /// Forward-auth middleware address, if a forward-auth middleware should
    /// be registered alongside the router.
    pub forward_auth_address: Option<String>,
    /// Headers the forward-auth response should copy onto the forwarded request.
    pub forward_auth_response_headers: Vec<String>,
}

/// Peer exposure fabric configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    /// Name of the event-bus event peers announce exposure under. Defaults
    /// to the core-owned `pylon_exposed` name; pluggable for test isolation.
    pub event_node: String,
    /// Whether this node advertises its own `url_prefix` onto the cluster.
    pub expose: bool,
    /// Whether this node forwards requests to peers for prefixes it doesn't
    /// serve locally.
    pub handle_enabled: bool,
    /// URL prefixes this node's local HTTP app installs catch-all forwarding
    /// handlers for.
    pub handle_prefixes: Vec<String>,
    /// How often the announcer re-emits this node's exposure, in seconds.
    pub announce_interval_secs: u64,
    /// How often the liveness checker pings peers, in seconds.
    pub ping_interval_secs: u64,
    /// How long to wait for a single ping response, in seconds.
    pub ping_timeout_secs: u64,
    /// Missed pings before a peer is evicted.
    pub max_missed_pings: u32,
    /// Timeout for a forwarded HTTP (`wsgi_call`) request, in seconds.
    pub forward_timeout_secs: u64,
    /// Timeout for a forwarded Socket.IO (`sio_call`) event, in seconds.
    pub sio_call_timeout_secs: u64,
    /// Enables verbose per-request exposure logging.
    pub debug: bool,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            event_node: "pylon_exposed".to_string(),
            expose: false,
            handle_enabled: false,
            handle_prefixes: Vec::new(),
            announce_interval_secs: 15,
            ping_interval_secs: 5,
            ping_timeout_secs: 3,
            max_missed_pings: 3,
            forward_timeout_secs: 30,
            sio_call_timeout_secs: 10,
            debug: false,
        }
    }
}
