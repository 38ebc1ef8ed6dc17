//! Configuration loading with layered overrides.
//!
//! Config is loaded in order (each layer overrides the previous):
//! 1. Default values
//! 2. Config file (TOML)
//! 3. Environment variables
//! 4. CLI arguments
//!
//! The JWT secret is never read from config files. It must come from the
//! environment or the command line and be at least [`MIN_SECRET_LEN`] bytes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Minimum JWT secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Configuration shared by every request.
pub type SharedConfig = Arc<Config>;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub auth: Auth,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory of static assets served for non-API paths.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    /// Allow every cross-origin request instead of same-origin only.
    #[serde(default)]
    pub cors_permissive: bool,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            cors_permissive: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    /// Local file path, `:memory:`, or a `libsql://` / `http(s)://` URL.
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Auth token for remote databases.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            auth_token: None,
        }
    }
}

fn default_database_url() -> String {
    "data/subhub.db".to_string()
}

/// Authentication settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct Auth {
    /// HS256 signing secret. Environment or CLI only.
    #[serde(default, skip_serializing)]
    pub jwt_secret: String,

    /// Token lifetime in hours.
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: u32,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_expiry_hours: default_token_expiry_hours(),
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("jwt_secret", &"[redacted]")
            .field("token_expiry_hours", &self.token_expiry_hours)
            .finish()
    }
}

fn default_token_expiry_hours() -> u32 {
    24
}

/// Values taken from the command line. `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
}

/// Builder for loading configuration with customizable options.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix (e.g., "SUBHUB" -> SUBHUB_HOST, SUBHUB_PORT)
    pub env_prefix: String,
    /// Name of the JWT secret environment variable (without prefix)
    pub jwt_secret_env: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            env_prefix: "SUBHUB".to_string(),
            jwt_secret_env: "JWT_SECRET".to_string(),
        }
    }
}

impl ConfigLoader {
    /// Create a new config loader with the given environment prefix.
    pub fn new(env_prefix: impl Into<String>) -> Self {
        Self {
            env_prefix: env_prefix.into(),
            ..Default::default()
        }
    }

    /// Load configuration from file, environment, and CLI overrides.
    pub fn load(&self, config_path: Option<&Path>, cli: &Overrides) -> crate::Result<Config> {
        let mut config: Config = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?
            }
            None => Config::default(),
        };

        if !config.auth.jwt_secret.is_empty() {
            tracing::warn!("Ignoring auth.jwt_secret from config file");
            config.auth.jwt_secret.clear();
        }

        let prefix = &self.env_prefix;

        if let Ok(host) = std::env::var(format!("{prefix}_HOST")) {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var(format!("{prefix}_PORT")) {
            config.server.port = port
                .parse()
                .map_err(|e| Error::Config(format!("{prefix}_PORT is not a valid port: {e}")))?;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(token) = std::env::var("DATABASE_AUTH_TOKEN") {
            config.database.auth_token = Some(token);
        }
        if let Ok(secret) = std::env::var(format!("{}_{}", prefix, self.jwt_secret_env)) {
            config.auth.jwt_secret = secret;
        }

        if let Some(host) = &cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(url) = &cli.database_url {
            config.database.url = url.clone();
        }
        if let Some(secret) = &cli.jwt_secret {
            config.auth.jwt_secret = secret.clone();
        }

        if config.auth.jwt_secret.is_empty() {
            return Err(Error::Config(format!(
                "{}_{} must be set via environment variable or --jwt-secret flag",
                prefix, self.jwt_secret_env
            )));
        }
        if config.auth.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(Error::Config(format!(
                "JWT secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if config.auth.token_expiry_hours == 0 {
            return Err(Error::Config(
                "auth.token_expiry_hours must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }
}
