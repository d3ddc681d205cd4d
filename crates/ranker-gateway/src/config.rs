//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP/WebSocket server configuration.
    pub http: HttpConfig,
    /// Access-token configuration.
    pub auth: AuthConfig,
    /// Poll limits and housekeeping.
    pub polls: PollsConfig,
    /// Room fan-out configuration.
    pub rooms: RoomsConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            auth: AuthConfig::default(),
            polls: PollsConfig::default(),
            rooms: RoomsConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration before startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("token_ttl_secs cannot be 0".into()));
        }
        if self.polls.min_votes_per_voter == 0 {
            return Err(ConfigError::Invalid(
                "min_votes_per_voter cannot be 0".into(),
            ));
        }
        if self.polls.min_votes_per_voter > self.polls.max_votes_per_voter {
            return Err(ConfigError::Invalid(
                "min_votes_per_voter exceeds max_votes_per_voter".into(),
            ));
        }
        if self.polls.max_topic_len == 0 || self.polls.max_name_len == 0 {
            return Err(ConfigError::Invalid("length bounds cannot be 0".into()));
        }
        if self.rooms.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity cannot be 0".into()));
        }
        Ok(())
    }

    /// Server bind address.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address.
    pub host: IpAddr,
    /// Port (default: 8080).
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

/// Access-token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. Must be overridden outside development.
    pub jwt_secret: String,
    /// Token lifetime in seconds (default: 2 hours).
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-only-secret".to_string(),
            token_ttl_secs: 7200,
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

/// Poll limits and housekeeping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollsConfig {
    /// Topic length bound in characters.
    pub max_topic_len: usize,
    /// Display name length bound in characters.
    pub max_name_len: usize,
    /// Nomination text length bound in characters.
    pub max_nomination_len: usize,
    /// Lower bound on votes_per_voter at poll creation.
    pub min_votes_per_voter: usize,
    /// Upper bound on votes_per_voter at poll creation.
    pub max_votes_per_voter: usize,
    /// A poll with zero connections and no mutation for this long is
    /// eligible for teardown.
    pub idle_timeout_secs: u64,
    /// Interval of the housekeeping sweep.
    pub housekeeping_interval_secs: u64,
}

impl Default for PollsConfig {
    fn default() -> Self {
        Self {
            max_topic_len: 100,
            max_name_len: 25,
            max_nomination_len: 100,
            min_votes_per_voter: 1,
            max_votes_per_voter: 5,
            idle_timeout_secs: 3600,
            housekeeping_interval_secs: 60,
        }
    }
}

impl PollsConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_secs)
    }
}

/// Room fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Outbound events buffered per connection before the connection is
    /// considered stuck and dropped.
    pub channel_capacity: usize,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// No JWT secret configured.
    #[error("jwt secret must be configured")]
    MissingJwtSecret,
    /// General configuration error.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
