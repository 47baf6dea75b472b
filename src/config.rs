use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Timing and sizing knobs for a single client connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionSettings {
    /// Read deadline; a connection that sends no pong within this window is dropped
    pub liveness_timeout: Duration,
    /// How often a ping is sent, always shorter than the liveness timeout
    pub ping_period: Duration,
    /// Upper bound on any single socket write
    pub write_timeout: Duration,
    /// Maximum message body length, in characters
    pub max_message_len: usize,
    /// Capacity of the per-connection outbound queue
    pub outbound_buffer: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        let liveness_timeout = Duration::from_secs(120);
        Self {
            liveness_timeout,
            ping_period: liveness_timeout * 9 / 10, // 108 seconds
            write_timeout: Duration::from_secs(10),
            max_message_len: 1000,
            outbound_buffer: 256,
        }
    }
}

/// Application configuration, loaded from the environment with defaults
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub session_expiration_days: i64,
    pub connection: ConnectionSettings,
    /// How long an empty room survives before it is torn down. `None` keeps rooms forever.
    pub room_grace_period: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            jwt_secret: "your-secret-key-change-in-production".to_string(),
            session_expiration_days: 365,
            connection: ConnectionSettings::default(),
            room_grace_period: Some(Duration::from_secs(60)),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup so tests don't have to touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("ROOMCAST_BIND_ADDR") {
            config.bind_addr = parse_value("ROOMCAST_BIND_ADDR", addr)?;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            config.jwt_secret = secret;
        }
        if let Some(days) = lookup("SESSION_EXPIRATION_DAYS") {
            config.session_expiration_days = parse_value("SESSION_EXPIRATION_DAYS", days)?;
        }
        if let Some(secs) = lookup("ROOMCAST_LIVENESS_TIMEOUT_SECS") {
            let secs: u64 = parse_value("ROOMCAST_LIVENESS_TIMEOUT_SECS", secs)?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "ROOMCAST_LIVENESS_TIMEOUT_SECS",
                    value: secs.to_string(),
                });
            }
            let timeout = Duration::from_secs(secs);
            config.connection.liveness_timeout = timeout;
            config.connection.ping_period = timeout * 9 / 10;
        }
        if let Some(secs) = lookup("ROOMCAST_WRITE_TIMEOUT_SECS") {
            config.connection.write_timeout =
                Duration::from_secs(parse_value("ROOMCAST_WRITE_TIMEOUT_SECS", secs)?);
        }
        if let Some(len) = lookup("ROOMCAST_MAX_MESSAGE_LEN") {
            config.connection.max_message_len = parse_value("ROOMCAST_MAX_MESSAGE_LEN", len)?;
        }
        if let Some(size) = lookup("ROOMCAST_OUTBOUND_BUFFER") {
            let size: usize = parse_value("ROOMCAST_OUTBOUND_BUFFER", size)?;
            // tokio's bounded channel panics on zero capacity
            if size == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "ROOMCAST_OUTBOUND_BUFFER",
                    value: size.to_string(),
                });
            }
            config.connection.outbound_buffer = size;
        }
        if let Some(secs) = lookup("ROOMCAST_ROOM_GRACE_SECS") {
            let secs: u64 = parse_value("ROOMCAST_ROOM_GRACE_SECS", secs)?;
            config.room_grace_period = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key, value })
}
