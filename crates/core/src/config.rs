use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

/// Process configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub postgres: PostgresConfig,
    pub broker: BrokerConfig,
    pub live: LiveConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RELAY_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RELAY_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            store: StoreConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            broker: BrokerConfig::from_env_profiled(p),
            live: LiveConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject combinations that cannot start.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.live.queue_capacity == 0 {
            return Err(RelayError::Config("LIVE_QUEUE_CAPACITY must be at least 1".into()));
        }
        match self.broker.transport {
            BrokerTransport::Zmq if self.broker.endpoint.is_empty() => {
                return Err(RelayError::Config("BROKER_ENDPOINT is empty".into()));
            }
            BrokerTransport::Mqtt if self.broker.mqtt.host.is_empty() => {
                return Err(RelayError::Config("MQTT_HOST is empty".into()));
            }
            BrokerTransport::Mqtt if self.broker.mqtt.queue_capacity == 0 => {
                return Err(RelayError::Config("MQTT_QUEUE_CAPACITY must be at least 1".into()));
            }
            _ => {}
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:   {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  store:    backend={}, seed={}",
            self.store.backend.as_str(),
            self.store
                .seed_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".into())
        );
        if self.store.backend == StoreBackend::Postgres {
            tracing::info!("  postgres: host={}, db={}", self.postgres.host, self.postgres.database);
        }
        tracing::info!(
            "  broker:   {} via {}",
            self.broker.transport.as_str(),
            self.broker.describe()
        );
        tracing::info!("  live:     queue_capacity={}", self.live.queue_capacity);
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8100),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Message store ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Postgres => "postgres",
            StoreBackend::Memory => "memory",
        }
    }

    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "mem" => StoreBackend::Memory,
            _ => StoreBackend::Postgres,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// JSON array of definitions inserted at startup.
    pub seed_file: Option<PathBuf>,
}

impl StoreConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            backend: StoreBackend::parse(&profiled_env_or(p, "MESSAGE_STORE", "postgres")),
            seed_file: profiled_env_opt(p, "SEED_FILE").map(PathBuf::from),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "relay"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "disable"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerTransport {
    /// MQTT client publishing to an external broker.
    Mqtt,
    /// ZeroMQ PUB socket carrying a MessagePack envelope.
    Zmq,
}

impl BrokerTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerTransport::Mqtt => "mqtt",
            BrokerTransport::Zmq => "zmq",
        }
    }

    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "zmq" | "zeromq" => BrokerTransport::Zmq,
            _ => BrokerTransport::Mqtt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerMode {
    /// Bind the PUB socket; subscribers connect to us.
    Bind,
    /// Connect the PUB socket to an upstream forwarder.
    Connect,
}

impl BrokerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerMode::Bind => "bind",
            BrokerMode::Connect => "connect",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u32,
    /// Publishes buffered while the connection is down before new ones fail.
    pub queue_capacity: usize,
}

impl MqttConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "MQTT_HOST", "localhost"),
            port: profiled_env_u16(p, "MQTT_PORT", 1883),
            client_id: profiled_env_or(p, "MQTT_CLIENT_ID", "relay-publisher"),
            username: profiled_env_opt(p, "MQTT_USERNAME"),
            password: profiled_env_opt(p, "MQTT_PASSWORD"),
            keep_alive_secs: profiled_env_u32(p, "MQTT_KEEP_ALIVE", 30),
            queue_capacity: profiled_env_u32(p, "MQTT_QUEUE_CAPACITY", 64) as usize,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub transport: BrokerTransport,
    /// ZeroMQ endpoint.
    pub endpoint: String,
    /// ZeroMQ socket mode.
    pub mode: BrokerMode,
    pub mqtt: MqttConfig,
}

impl BrokerConfig {
    fn from_env_profiled(p: &str) -> Self {
        let mode = match profiled_env_or(p, "BROKER_MODE", "bind").to_ascii_lowercase().as_str() {
            "connect" => BrokerMode::Connect,
            _ => BrokerMode::Bind,
        };
        Self {
            transport: BrokerTransport::parse(&profiled_env_or(p, "BROKER_TRANSPORT", "mqtt")),
            endpoint: profiled_env_or(p, "BROKER_ENDPOINT", "tcp://0.0.0.0:5556"),
            mode,
            mqtt: MqttConfig::from_env_profiled(p),
        }
    }

    /// Human-readable target for logs.
    pub fn describe(&self) -> String {
        match self.transport {
            BrokerTransport::Mqtt => format!("mqtt://{}:{}", self.mqtt.host, self.mqtt.port),
            BrokerTransport::Zmq => format!("{} ({})", self.endpoint, self.mode.as_str()),
        }
    }
}

// ── Live observers ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Outbound frames buffered per observer before it is dropped.
    pub queue_capacity: usize,
}

impl LiveConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            queue_capacity: profiled_env_u32(p, "LIVE_QUEUE_CAPACITY", 256) as usize,
        }
    }
}
