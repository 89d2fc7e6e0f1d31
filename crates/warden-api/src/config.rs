//! # Service Configuration
//!
//! Layered: built-in defaults, then an optional YAML file named by
//! `WARDEN_CONFIG`, then individual environment overrides.
//!
//! ```yaml
//! server:
//!   port: 8080
//!   api_prefix: /api/v1
//! jwt:
//!   issuer: warden
//!   token_secret: change-me
//!   token_lifetimes:
//!     web: 86400
//! rate_limit:
//!   global_per_minute: 100
//!   login_per_minute: 10
//!   trusted_proxies: ["10.0.0.1"]
//! login:
//!   verification_code: "666666"
//! database_url: postgres://warden@localhost/warden
//! redis_url: redis://127.0.0.1:6379/0
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_core::{TokenLifetimes, TokenSecret};

/// Secret used when none is configured. Never acceptable outside development.
const DEV_TOKEN_SECRET: &str = "warden-development-secret";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Path prefix of the login and user routes, e.g. `/api/v1`.
    pub api_prefix: String,
}

impl ServerConfig {
    /// The API prefix as a router mount point: one leading slash, no
    /// trailing slash. `None` when the routes sit at the root.
    pub fn mount_prefix(&self) -> Option<String> {
        let trimmed = self.api_prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{trimmed}"))
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            api_prefix: "/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub issuer: String,
    pub token_secret: TokenSecret,
    pub token_lifetimes: TokenLifetimes,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "warden".to_string(),
            token_secret: TokenSecret::new(DEV_TOKEN_SECRET),
            token_lifetimes: TokenLifetimes::default(),
        }
    }
}

impl JwtConfig {
    pub fn uses_development_secret(&self) -> bool {
        self.token_secret.expose() == DEV_TOKEN_SECRET
    }
}

/// Per-minute admission quotas per client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub global_per_minute: u64,
    pub login_per_minute: u64,
    /// Peers whose `X-Forwarded-For` / `X-Real-IP` headers are believed.
    /// Requests from anyone else are keyed by their socket address.
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: 100,
            login_per_minute: 10,
            trusted_proxies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// One-time code accepted by the fixed verifier.
    pub verification_code: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            verification_code: "666666".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub login: LoginConfig,
    /// PostgreSQL URL; in-memory principal store when absent.
    pub database_url: Option<String>,
    /// Redis URL; in-memory cache when absent.
    pub redis_url: Option<String>,
}

impl AppConfig {
    /// Load from `WARDEN_CONFIG` and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os("WARDEN_CONFIG").map(PathBuf::from);
        Self::load_from(file.as_deref(), |var| std::env::var(var).ok())
    }

    /// Load from an optional file and an environment lookup.
    pub fn load_from(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(port) = env("PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(url) = non_empty(env("DATABASE_URL")) {
            self.database_url = Some(url);
        }
        if let Some(url) = non_empty(env("REDIS_URL")) {
            self.redis_url = Some(url);
        }
        if let Some(secret) = non_empty(env("JWT_SECRET")) {
            self.jwt.token_secret = TokenSecret::new(secret);
        }
        if let Some(issuer) = non_empty(env("JWT_ISSUER")) {
            self.jwt.issuer = issuer;
        }
        if let Some(raw) = non_empty(env("TRUSTED_PROXIES")) {
            self.rate_limit.trusted_proxies = raw
                .split(',')
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(|ip| {
                    ip.parse().map_err(|_| ConfigError::InvalidEnv {
                        var: "TRUSTED_PROXIES",
                        value: raw.clone(),
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
