use std::path::Path;

use anyhow::{Context, Result};
use invex_extract::hosted::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use invex_extract::{ExtractionMode, SyntheticProfile};
use serde::Deserialize;

/// Config file read when `--config` is not given. Its absence is not an error.
pub const DEFAULT_CONFIG_FILE: &str = "invex.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    pub hosted: HostedConfig,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostedConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub mode: ExtractionMode,
    /// Synthetic fallback chain, tried in order.
    pub profiles: Vec<SyntheticProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            hosted: HostedConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
            api_key_env: "GOOGLE_API_KEY".to_string(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::default(),
            profiles: SyntheticProfile::DEFAULT_CHAIN.to_vec(),
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config TOML")
    }

    /// Load `path`, or `invex.toml` from the working directory when no path is given.
    /// An explicit path must exist; the default file may be missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// The hosted-model API key, if set to something non-blank.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.hosted.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}
