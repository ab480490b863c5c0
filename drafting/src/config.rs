//! Drafting configuration: built-in defaults, optional TOML file, env overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "drafting/config/drafting.toml";
const BUILTIN_CONFIG_TOML: &str = include_str!("../config/drafting.example.toml");

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse env var {key}={value}: {reason}")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("Failed to parse config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
    pub retry_delay_ms: u64,
}

impl AutosaveConfig {
    pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 10_000;

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn with_retry_delay_ms(mut self, retry_delay_ms: u64) -> Self {
        self.retry_delay_ms = retry_delay_ms;
        self
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::DEFAULT_DEBOUNCE_MS,
            retry_delay_ms: Self::DEFAULT_RETRY_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// REST base URL; drafts stay in memory when unset
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DraftingConfig {
    pub autosave: AutosaveConfig,
    pub backend: BackendConfig,
}

impl DraftingConfig {
    /// Resolve the config file (`DRAFTING_CONFIG_PATH`, then
    /// `drafting/config/drafting.toml` in cwd or an ancestor, then the
    /// built-in example) and apply `DRAFTING_*` env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit_path = std::env::var("DRAFTING_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let mut config = match explicit_path.or_else(|| find_default_config_path(DEFAULT_CONFIG_PATH))
        {
            Some(path) => Self::load_file_or_builtin(&path),
            None => built_in_config(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    fn load_file_or_builtin(path: &Path) -> Self {
        Self::from_path(path).unwrap_or_else(|err| {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Failed to load drafting config file; using built-in defaults"
            );
            built_in_config()
        })
    }

    /// Apply `DRAFTING_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(debounce_ms) = parse_override(&lookup, "DRAFTING_DEBOUNCE_MS")? {
            self.autosave.debounce_ms = debounce_ms;
        }
        if let Some(retry_delay_ms) = parse_override(&lookup, "DRAFTING_RETRY_DELAY_MS")? {
            self.autosave.retry_delay_ms = retry_delay_ms;
        }
        if let Some(timeout_ms) = parse_override(&lookup, "DRAFTING_API_TIMEOUT_MS")? {
            self.backend.timeout_ms = timeout_ms;
        }
        if let Some(base_url) = lookup("DRAFTING_API_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.backend.base_url = Some(base_url);
        }
        if let Some(token) = lookup("DRAFTING_API_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.backend.api_token = Some(token);
        }
        Ok(())
    }
}

fn parse_override<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnv {
                key: key.to_string(),
                value,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn built_in_config() -> DraftingConfig {
    DraftingConfig::from_toml_str(BUILTIN_CONFIG_TOML).unwrap_or_else(|err| {
        tracing::error!(error = %err, "Failed to parse built-in drafting config");
        DraftingConfig::default()
    })
}

fn find_default_config_path(relative_path: &str) -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;
    loop {
        let candidate = current.join(relative_path);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}
