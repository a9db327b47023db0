//! Runtime configuration.
//!
//! Durations are written the human way (`45s`, `2m`, `500ms`) and parsed
//! with `humantime`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use veriscan_core::{ConfigError, ReconcileConfig};

/// Runtime configuration for the analysis orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bound on model initialization and on each model call
    #[serde(with = "duration_human")]
    pub model_timeout: Duration,

    /// Bound on each link probe
    #[serde(with = "duration_human")]
    pub fetch_timeout: Duration,

    /// Probe citation URLs and set their status
    pub probe_links: bool,

    pub link_cache: LinkCacheConfig,

    pub forensics: ForensicsConfig,

    pub reconcile: ReconcileConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(45),
            fetch_timeout: Duration::from_secs(10),
            probe_links: false,
            link_cache: LinkCacheConfig::default(),
            forensics: ForensicsConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

/// Link status cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkCacheConfig {
    pub max_entries: u64,

    #[serde(with = "duration_human")]
    pub ttl: Duration,
}

impl Default for LinkCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Forensic dump settings; dumps are off without a directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForensicsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_dir: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Parse from YAML and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "model_timeout must be greater than zero".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "fetch_timeout must be greater than zero".to_string(),
            ));
        }
        self.reconcile.validate()
    }
}

mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
