//! Reconciliation configuration.
//!
//! Every threshold and bonus is a named field with a default. Configuration
//! loads from YAML or JSON; omitted fields keep their defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// How source strengths inside one segment combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentAggregation {
    /// Strongest single source
    #[default]
    Max,
    /// Average over sources
    Mean,
}

impl SegmentAggregation {
    /// Combine strengths; an empty set contributes 0.
    pub fn combine(&self, strengths: impl IntoIterator<Item = f64>) -> f64 {
        let values: Vec<f64> = strengths.into_iter().collect();
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Self::Max => values.iter().copied().fold(0.0, f64::max),
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
        }
    }
}

/// Scoring thresholds and bonuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub high_threshold: f64,
    pub medium_high_threshold: f64,
    pub medium_threshold: f64,
    /// Added once when sources span more than one domain
    pub consistency_bonus: f64,
    /// Added when the model verified uploaded content against the web
    pub multimodal_bonus: f64,
    /// Confidence assumed for a source with no score
    pub missing_confidence: f64,
    pub aggregation: SegmentAggregation,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            high_threshold: 0.85,
            medium_high_threshold: 0.65,
            medium_threshold: 0.40,
            consistency_bonus: 0.05,
            multimodal_bonus: 0.05,
            missing_confidence: 0.5,
            aggregation: SegmentAggregation::Max,
        }
    }
}

/// Fingerprint matching limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorPolicy {
    /// Prefix length used as the fingerprint
    pub fingerprint_chars: usize,
    /// Shorter fingerprints are not attempted
    pub min_fingerprint_chars: usize,
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        Self {
            fingerprint_chars: 20,
            min_fingerprint_chars: 5,
        }
    }
}

/// Domain authority settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    pub default_authority: f64,
    pub verified_authority: f64,
    pub verified_domains: Vec<String>,
    /// JSON file holding an array of verified domains
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_domains_file: Option<PathBuf>,
    /// Per-domain authority, overriding both defaults
    pub overrides: BTreeMap<String, f64>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            default_authority: 0.8,
            verified_authority: 1.0,
            verified_domains: Vec::new(),
            verified_domains_file: None,
            overrides: BTreeMap::new(),
        }
    }
}

/// Top-level reconciliation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub scoring: ScoringPolicy,
    pub anchoring: AnchorPolicy,
    pub authority: AuthorityConfig,
    /// Characters of raw output logged when reconciliation degrades
    pub excerpt_chars: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringPolicy::default(),
            anchoring: AnchorPolicy::default(),
            authority: AuthorityConfig::default(),
            excerpt_chars: 200,
        }
    }
}

impl ReconcileConfig {
    /// Parse from a YAML string and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a JSON string and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, choosing the format by extension (`.json` or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Check value ranges and threshold ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scoring;
        let unit_fields = [
            ("scoring.high_threshold", s.high_threshold),
            ("scoring.medium_high_threshold", s.medium_high_threshold),
            ("scoring.medium_threshold", s.medium_threshold),
            ("scoring.consistency_bonus", s.consistency_bonus),
            ("scoring.multimodal_bonus", s.multimodal_bonus),
            ("scoring.missing_confidence", s.missing_confidence),
            ("authority.default_authority", self.authority.default_authority),
            ("authority.verified_authority", self.authority.verified_authority),
        ];
        for (name, value) in unit_fields {
            check_unit(name, value)?;
        }
        for (domain, value) in &self.authority.overrides {
            check_unit(&format!("authority.overrides.{}", domain), *value)?;
        }

        if !(s.medium_threshold <= s.medium_high_threshold
            && s.medium_high_threshold <= s.high_threshold)
        {
            return Err(ConfigError::ValidationError(
                "thresholds must satisfy medium <= medium_high <= high".to_string(),
            ));
        }

        if self.anchoring.min_fingerprint_chars == 0
            || self.anchoring.min_fingerprint_chars > self.anchoring.fingerprint_chars
        {
            return Err(ConfigError::ValidationError(
                "anchoring.min_fingerprint_chars must be in 1..=fingerprint_chars".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}
