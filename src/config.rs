//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.critsync.toml` files and validating it before any network call.

use crate::error::{SyncError, SyncResult};
use crate::models::{default_bands, AnalysisId, ThresholdBand};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".critsync.toml";

/// A credential that never shows up in `Debug` output and is wiped from
/// memory on drop.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret::new)
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Egerie (risk analysis) endpoint and credentials.
    #[serde(default)]
    pub egerie: EgerieConfig,

    /// Cyberwatch (inventory) endpoint and API keys.
    #[serde(default)]
    pub cyberwatch: CyberwatchConfig,

    /// Synchronization settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Egerie connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EgerieConfig {
    /// Base URL, e.g. `https://egerie.example.com`.
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: Secret,
}

/// Cyberwatch connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CyberwatchConfig {
    /// Base URL, e.g. `https://cyberwatch.example.com`.
    #[serde(default)]
    pub url: String,

    /// API access key.
    #[serde(default)]
    pub api_key: String,

    /// API secret key.
    #[serde(default)]
    pub secret_key: Secret,
}

/// What to synchronize and how scores map to criticalities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Egerie analyses to fetch, in order. Later analyses win on duplicate labels.
    #[serde(default)]
    pub analyses: Vec<AnalysisId>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Sigma bands, evaluated in order. The last matching band wins.
    #[serde(default = "default_bands")]
    pub bands: Vec<ThresholdBand>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            analyses: Vec::new(),
            timeout_seconds: default_timeout(),
            bands: default_bands(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.critsync.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and their environment variables) take precedence over
    /// config file settings, but only when explicitly provided.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref analyses) = args.analyses {
            self.sync.analyses = analyses
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(AnalysisId::new)
                .collect();
        }

        if let Some(timeout) = args.timeout {
            self.sync.timeout_seconds = timeout;
        }

        if let Some(ref url) = args.egerie_url {
            self.egerie.url = url.clone();
        }
        if let Some(ref username) = args.egerie_username {
            self.egerie.username = username.clone();
        }
        if let Some(ref password) = args.egerie_password {
            self.egerie.password = Secret::new(password.clone());
        }

        if let Some(ref url) = args.cyberwatch_url {
            self.cyberwatch.url = url.clone();
        }
        if let Some(ref api_key) = args.cyberwatch_api_key {
            self.cyberwatch.api_key = api_key.clone();
        }
        if let Some(ref secret_key) = args.cyberwatch_secret_key {
            self.cyberwatch.secret_key = Secret::new(secret_key.clone());
        }
    }

    /// Check that everything a run needs is present and well-formed.
    pub fn validate(&self) -> SyncResult<()> {
        if self.sync.analyses.is_empty() {
            return Err(SyncError::Configuration(
                "at least one Egerie analysis id is required (the Egerie API cannot list analyses)"
                    .to_string(),
            ));
        }
        if self.sync.analyses.iter().any(|a| a.as_str().is_empty()) {
            return Err(SyncError::Configuration(
                "analysis ids must not be blank".to_string(),
            ));
        }

        validate_url("egerie.url", &self.egerie.url)?;
        validate_url("cyberwatch.url", &self.cyberwatch.url)?;

        if self.egerie.username.is_empty() || self.egerie.password.is_empty() {
            return Err(SyncError::Configuration(
                "egerie.username and egerie.password are required".to_string(),
            ));
        }
        if self.cyberwatch.api_key.is_empty() || self.cyberwatch.secret_key.is_empty() {
            return Err(SyncError::Configuration(
                "cyberwatch.api_key and cyberwatch.secret_key are required".to_string(),
            ));
        }

        if self.sync.timeout_seconds == 0 {
            return Err(SyncError::Configuration(
                "sync.timeout_seconds must be at least 1".to_string(),
            ));
        }

        for band in &self.sync.bands {
            if band.min.is_nan() || band.max.is_nan() || band.min > band.max {
                return Err(SyncError::Configuration(format!(
                    "invalid threshold band [{}, {}] for tier {}",
                    band.min, band.max, band.tier
                )));
            }
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn validate_url(field: &str, url: &str) -> SyncResult<()> {
    if url.is_empty() {
        return Err(SyncError::Configuration(format!("{} is required", field)));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(SyncError::Configuration(format!(
            "{} must start with 'http://' or 'https://'",
            field
        )));
    }
    Ok(())
}
