//! Configuration for the casetrack client.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (`--api-url`)
//! 2. Environment variables (CASETRACK_API_URL, CASETRACK_POLL_INTERVAL_SECS,
//!    CASETRACK_MAX_POLL_ATTEMPTS)
//! 3. Config file (.casetrack/config.yaml)
//! 4. Defaults (local backend, 5 s polls, 360 attempts)
//!
//! Config file discovery:
//! - Searches current directory and parents for .casetrack/config.yaml
//! - Falls back to ~/.casetrack/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{PollSettings, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};

/// Backend the reference deployment listens on
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

const ENV_API_URL: &str = "CASETRACK_API_URL";
const ENV_POLL_INTERVAL: &str = "CASETRACK_POLL_INTERVAL_SECS";
const ENV_MAX_POLL_ATTEMPTS: &str = "CASETRACK_MAX_POLL_ATTEMPTS";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollingConfig {
    pub interval_seconds: Option<u64>,
    /// `0` disables the cap
    pub max_attempts: Option<u32>,
}

/// Values taken from the environment
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub api_url: Option<String>,
    pub poll_interval_secs: Option<String>,
    pub max_poll_attempts: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var(ENV_API_URL).ok(),
            poll_interval_secs: std::env::var(ENV_POLL_INTERVAL).ok(),
            max_poll_attempts: std::env::var(ENV_MAX_POLL_ATTEMPTS).ok(),
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// Backend base URL, passed explicitly to the repository client
    pub api_base_url: String,
    /// Polling cadence for evidence tracking
    pub poll: PollSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            poll: PollSettings::default(),
            config_file: None,
        }
    }
}

impl ResolvedConfig {
    /// Apply a command-line base URL override
    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url {
            self.api_base_url = url;
        }
        self
    }
}

/// Find config file by searching current directory and parents, then home
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(".casetrack").join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".casetrack").join("config.yaml"))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge file and environment values over the defaults
fn resolve(
    file: Option<ConfigFile>,
    config_file: Option<PathBuf>,
    env: &EnvOverrides,
) -> Result<ResolvedConfig> {
    let file = file.unwrap_or_default();

    let api_base_url = env
        .api_url
        .clone()
        .or(file.api.base_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let interval_seconds = match &env.poll_interval_secs {
        Some(raw) => Some(
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid {}: {}", ENV_POLL_INTERVAL, raw))?,
        ),
        None => file.polling.interval_seconds,
    };

    let interval = match interval_seconds {
        Some(0) => anyhow::bail!("Poll interval must be at least 1 second"),
        Some(secs) => Duration::from_secs(secs),
        None => DEFAULT_POLL_INTERVAL,
    };

    let max_attempts = match &env.max_poll_attempts {
        Some(raw) => Some(
            raw.trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid {}: {}", ENV_MAX_POLL_ATTEMPTS, raw))?,
        ),
        None => file.polling.max_attempts,
    };

    let max_attempts = match max_attempts {
        Some(0) => None,
        Some(max) => Some(max),
        None => Some(DEFAULT_MAX_POLL_ATTEMPTS),
    };

    Ok(ResolvedConfig {
        api_base_url,
        poll: PollSettings {
            interval,
            max_attempts,
        },
        config_file,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();

    let file = match &config_file {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    resolve(file, config_file, &EnvOverrides::from_env())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
