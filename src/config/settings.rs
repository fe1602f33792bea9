//! Application settings and configuration structures.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use config::{Config, Environment};
use serde::Deserialize;

/// Store URL used when `DATABASE_URL` is unset or empty.
pub const DEFAULT_DATABASE_URL: &str = "postgres://127.0.0.1:5432/chattyapp-backend";

/// Minimum length for each session signing secret.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Configuration failures. All of them are fatal before any listener opens.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration {field} is undefined")]
    Missing { field: &'static str },

    #[error("configuration {field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

/// Root configuration, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP listener and allowed client origin
    pub server: ServerSettings,

    /// Durable store connection
    pub database: DatabaseSettings,

    /// Pub/sub backbone used for fan-out
    pub redis: RedisSettings,

    /// Session cookie signing keys
    pub session: SessionSettings,

    /// Real-time socket limits
    pub websocket: WebSocketSettings,

    /// Environment tag (development, local, staging, production, ...)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// The single origin allowed by CORS and the socket handshake
    pub client_url: String,
}

/// Durable store configuration.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Seconds between liveness pings
    pub health_check_interval: u64,

    /// First reconnect delay in milliseconds
    pub reconnect_initial_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds
    pub reconnect_max_ms: u64,
}

/// Pub/sub backbone configuration.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// Backbone address, e.g. `redis://127.0.0.1:6379`
    pub url: String,

    /// Topic every gateway instance publishes to and subscribes on
    pub topic: String,

    /// First delay before re-establishing a lost subscription, in milliseconds
    pub reconnect_initial_ms: u64,

    /// Upper bound for the re-establish delay in milliseconds
    pub reconnect_max_ms: u64,
}

/// Session signing secrets. Key one signs, both verify.
#[derive(Clone)]
pub struct SessionSettings {
    pub secret_key_one: String,
    pub secret_key_two: String,
}

impl std::fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSettings")
            .field("secret_key_one", &"[redacted]")
            .field("secret_key_two", &"[redacted]")
            .finish()
    }
}

/// WebSocket configuration.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Maximum inbound message size in bytes
    pub max_message_size: usize,
}

/// Flat view of the environment as `config` sees it (keys lowercased).
#[derive(Debug, Deserialize)]
struct RawSettings {
    server_host: String,
    server_port: u16,
    client_url: Option<String>,
    database_url: Option<String>,
    database_max_connections: u32,
    database_min_connections: u32,
    database_acquire_timeout: u64,
    database_health_check_interval: u64,
    database_reconnect_initial_ms: u64,
    database_reconnect_max_ms: u64,
    redis_host: Option<String>,
    fanout_topic: String,
    redis_reconnect_initial_ms: u64,
    redis_reconnect_max_ms: u64,
    secret_key_one: Option<String>,
    secret_key_two: Option<String>,
    ws_max_message_size: usize,
    run_env: Option<String>,
}

impl Settings {
    /// Load settings from `.env` and the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the first required variable
    /// that is absent or empty, `ConfigError::Invalid` for values that fail
    /// validation.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_environment(Environment::default())
    }

    /// Build settings from an explicit variable map instead of the process
    /// environment.
    pub fn from_env_map<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_environment(Environment::default().source(Some(map.into_iter().collect())))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        let raw: RawSettings = Config::builder()
            .set_default("server_host", "0.0.0.0")?
            .set_default("server_port", 5000)?
            .set_default("database_max_connections", 10)?
            .set_default("database_min_connections", 1)?
            .set_default("database_acquire_timeout", 30)?
            .set_default("database_health_check_interval", 5)?
            .set_default("database_reconnect_initial_ms", 500)?
            .set_default("database_reconnect_max_ms", 30_000)?
            .set_default("fanout_topic", "chat:fanout")?
            .set_default("redis_reconnect_initial_ms", 500)?
            .set_default("redis_reconnect_max_ms", 30_000)?
            .set_default("ws_max_message_size", 65536_i64)? // 64KB
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        raw.validate()
    }

    /// Local and development environments serve cookies without `secure`.
    pub fn is_development(&self) -> bool {
        is_development_tag(&self.environment)
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RawSettings {
    /// Every required value is checked in declaration order; the first
    /// absent one is reported.
    fn validate(self) -> Result<Settings, ConfigError> {
        let database_url = present(self.database_url)
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let secret_key_one = required(self.secret_key_one, "SECRET_KEY_ONE")?;
        let secret_key_two = required(self.secret_key_two, "SECRET_KEY_TWO")?;
        let environment = required(self.run_env, "RUN_ENV")?;
        let client_url = required(self.client_url, "CLIENT_URL")?;
        let redis_url = required(self.redis_host, "REDIS_HOST")?;

        check_secret(&secret_key_one, "SECRET_KEY_ONE")?;
        check_secret(&secret_key_two, "SECRET_KEY_TWO")?;
        check_origin(&client_url)?;

        check_backoff(
            self.database_reconnect_initial_ms,
            self.database_reconnect_max_ms,
            "DATABASE_RECONNECT_MAX_MS",
            "DATABASE_RECONNECT_INITIAL_MS",
        )?;
        check_backoff(
            self.redis_reconnect_initial_ms,
            self.redis_reconnect_max_ms,
            "REDIS_RECONNECT_MAX_MS",
            "REDIS_RECONNECT_INITIAL_MS",
        )?;

        Ok(Settings {
            server: ServerSettings {
                host: self.server_host,
                port: self.server_port,
                client_url,
            },
            database: DatabaseSettings {
                url: database_url,
                max_connections: self.database_max_connections,
                min_connections: self.database_min_connections,
                acquire_timeout: self.database_acquire_timeout,
                health_check_interval: self.database_health_check_interval,
                reconnect_initial_ms: self.database_reconnect_initial_ms,
                reconnect_max_ms: self.database_reconnect_max_ms,
            },
            redis: RedisSettings {
                url: redis_url,
                topic: self.fanout_topic,
                reconnect_initial_ms: self.redis_reconnect_initial_ms,
                reconnect_max_ms: self.redis_reconnect_max_ms,
            },
            session: SessionSettings {
                secret_key_one,
                secret_key_two,
            },
            websocket: WebSocketSettings {
                max_message_size: self.ws_max_message_size,
            },
            environment,
        })
    }
}

impl ServerSettings {
    /// Get the socket address for binding.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl DatabaseSettings {
    pub fn health_check_period(&self) -> Duration {
        Duration::from_secs(self.health_check_interval.max(1))
    }
}

pub(crate) fn is_development_tag(environment: &str) -> bool {
    environment.eq_ignore_ascii_case("development") || environment.eq_ignore_ascii_case("local")
}

fn check_backoff(
    initial_ms: u64,
    max_ms: u64,
    field: &'static str,
    initial_field: &str,
) -> Result<(), ConfigError> {
    if initial_ms == 0 || max_ms < initial_ms {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("must be at least {initial_field}, which must be non-zero"),
        });
    }
    Ok(())
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    present(value).ok_or(ConfigError::Missing { field })
}

fn check_secret(secret: &str, field: &'static str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::Invalid {
            field,
            reason: format!(
                "must be at least {} characters, got {}",
                MIN_SECRET_LENGTH,
                secret.len()
            ),
        });
    }
    Ok(())
}

fn check_origin(origin: &str) -> Result<(), ConfigError> {
    let scheme_ok = origin.starts_with("http://") || origin.starts_with("https://");
    if !scheme_ok || HeaderValue::from_str(origin).is_err() {
        return Err(ConfigError::Invalid {
            field: "CLIENT_URL",
            reason: format!("{origin:?} is not an http(s) origin"),
        });
    }
    Ok(())
}
