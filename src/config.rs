//! Configuration loading and management.

use crate::schedule::DEFAULT_OPEN_ENDED_HORIZON_DAYS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = ".timely/config.yaml";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5000;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".timely/timely.db")
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Authentication configuration.
///
/// Login happens at the single sign-on gateway in front of the server, which
/// forwards the authenticated user id in a request header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_user_header")]
    pub user_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_header: default_user_header(),
        }
    }
}

fn default_user_header() -> String {
    "X-Remote-User".to_string()
}

/// Iteration scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Days ahead a repeating task without a repeat end is generated.
    #[serde(default = "default_horizon")]
    pub open_ended_horizon_days: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            open_ended_horizon_days: default_horizon(),
        }
    }
}

fn default_horizon() -> i64 {
    DEFAULT_OPEN_ENDED_HORIZON_DAYS
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location or return defaults,
    /// then apply environment overrides.
    pub fn load_or_default() -> Self {
        let mut config = match Self::load(DEFAULT_CONFIG_PATH) {
            Ok(config) => config,
            Err(e) => {
                if Path::new(DEFAULT_CONFIG_PATH).exists() {
                    tracing::warn!(error = %e, "Ignoring unreadable config file");
                }
                Self::default()
            }
        };
        config.apply_env();
        config
    }

    /// Override settings from `TIMELY_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(db_path) = lookup("TIMELY_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Some(port) = lookup("TIMELY_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid TIMELY_PORT"),
            }
        }

        if let Some(header) = lookup("TIMELY_USER_HEADER") {
            if !header.trim().is_empty() {
                self.auth.user_header = header;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.schedule.open_ended_horizon_days < 0 {
            anyhow::bail!(
                "schedule.open_ended_horizon_days must not be negative (got {})",
                self.schedule.open_ended_horizon_days
            );
        }
        if self.auth.user_header.trim().is_empty() {
            anyhow::bail!("auth.user_header must not be empty");
        }
        Ok(())
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
