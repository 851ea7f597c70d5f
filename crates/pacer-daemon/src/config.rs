//! Daemon configuration parsing.
//!
//! The daemon reads a TOML file with a `[sweep]` section for scheduler
//! tuning and an `[evaluator]` section for breach-evaluator tuning. Every
//! field has a default, and the parsed configuration is validated
//! fail-closed before the daemon starts.

use std::path::Path;

use pacer_core::breach::EvaluatorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration load and validation errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The sweep interval must be positive.
    #[error("sweep interval must be positive")]
    ZeroInterval,

    /// The worker pool must allow at least one tenant.
    #[error("max_concurrent_tenants must be at least 1")]
    ZeroWorkers,

    /// The at-risk ratio must lie strictly between 0 and 1.
    #[error("at_risk_ratio {value} is outside (0, 1)")]
    InvalidAtRiskRatio {
        /// The rejected value.
        value: f64,
    },
}

/// Scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSection {
    /// Seconds between sweeps. Operationally 5-15 minutes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Maximum tenants evaluated concurrently.
    #[serde(default = "default_max_concurrent_tenants")]
    pub max_concurrent_tenants: usize,
    /// Run every sweep in dry-run mode (evaluation only, no persistence
    /// or dispatch). An operational testing switch.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_concurrent_tenants: default_max_concurrent_tenants(),
            dry_run: false,
        }
    }
}

/// Breach-evaluator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorSection {
    /// Fraction of a budget used as the at-risk lead window when a target
    /// does not configure an explicit reminder lead.
    #[serde(default = "default_at_risk_ratio")]
    pub at_risk_ratio: f64,
}

impl Default for EvaluatorSection {
    fn default() -> Self {
        Self {
            at_risk_ratio: default_at_risk_ratio(),
        }
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Scheduler tuning.
    #[serde(default)]
    pub sweep: SweepSection,
    /// Evaluator tuning.
    #[serde(default)]
    pub evaluator: EvaluatorSection,
}

impl DaemonConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read or parsed,
    /// or when a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.sweep.max_concurrent_tenants == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if !(self.evaluator.at_risk_ratio > 0.0 && self.evaluator.at_risk_ratio < 1.0) {
            return Err(ConfigError::InvalidAtRiskRatio {
                value: self.evaluator.at_risk_ratio,
            });
        }
        Ok(())
    }

    /// The evaluator configuration this daemon config selects.
    #[must_use]
    pub fn evaluator_config(&self) -> EvaluatorConfig {
        EvaluatorConfig {
            at_risk_ratio: self.evaluator.at_risk_ratio,
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_max_concurrent_tenants() -> usize {
    4
}

fn default_at_risk_ratio() -> f64 {
    0.10
}
