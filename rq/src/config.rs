//! Configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::DispatchConfig;
use crate::scheduler::SchedulerConfig;

/// Placeholder shown instead of a configured password
const REDACTED: &str = "********";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RCON endpoint
    pub rcon: RconConfig,

    /// Action scheduling
    pub scheduler: SchedulerConfig,

    /// Command dispatch worker
    pub dispatch: DispatchConfig,

    /// Log every processed command with its timing and response size
    #[serde(rename = "debug-show-commands")]
    pub debug_show_commands: bool,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .rconqueue.yml
        let local_config = PathBuf::from(".rconqueue.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/rconqueue/rconqueue.yml
        if let Some(user_config) = user_config_path() {
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Follows the same fallback chain as [`Config::load`] and swallows errors;
    /// the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".rconqueue.yml")];
                paths.extend(user_config_path());
                paths
            }
        };

        candidates
            .into_iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(&p).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Copy safe to print: passwords replaced
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.rcon.password.is_empty() {
            config.rcon.password = REDACTED.to_string();
        }
        config
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rconqueue").join("rconqueue.yml"))
}

/// RCON endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RconConfig {
    /// Server address
    pub host: String,

    /// Server RCON port
    pub port: u16,

    /// RCON password; when empty, read from `password-env`
    pub password: String,

    /// Environment variable holding the password
    #[serde(rename = "password-env")]
    pub password_env: String,

    /// Connect/read/write timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 27015,
            password: String::new(),
            password_env: "RCON_PASSWORD".to_string(),
            timeout_ms: 5000,
        }
    }
}

impl RconConfig {
    /// Password from the config, falling back to the environment
    pub fn resolve_password(&self) -> String {
        if !self.password.is_empty() {
            return self.password.clone();
        }
        std::env::var(&self.password_env).unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
