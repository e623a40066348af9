//! Configuration loading and typed config structures for the MICT simulation.
//!
//! The configuration lives in a YAML file (`mict-config.yaml` by default).
//! This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every field has a default, so an empty file is a valid configuration.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an impossible simulation.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Step rate and run bounds.
    #[serde(default)]
    pub simulation: SimulationBoundsConfig,

    /// Shape of the generated organism.
    #[serde(default)]
    pub organism: OrganismConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `MICT_LOG` overrides `logging.level`
    /// - `MICT_STEPS_PER_SECOND` overrides `simulation.steps_per_second`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MICT_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MICT_LOG") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("MICT_STEPS_PER_SECOND") {
            match val.parse::<f64>() {
                Ok(rate) => self.simulation.steps_per_second = rate,
                Err(e) => {
                    tracing::warn!(value = %val, error = %e, "ignoring malformed MICT_STEPS_PER_SECOND");
                }
            }
        }
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rate = self.simulation.steps_per_second;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!("simulation.steps_per_second must be positive, got {rate}"),
            });
        }
        if self.organism.neurons == 0 {
            return Err(ConfigError::Invalid {
                reason: "organism.neurons must be at least 1".to_owned(),
            });
        }
        if self.organism.min_weight > self.organism.max_weight {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "organism.min_weight ({}) exceeds organism.max_weight ({})",
                    self.organism.min_weight, self.organism.max_weight
                ),
            });
        }
        Ok(())
    }
}

/// Step rate and run bounds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationBoundsConfig {
    /// Root ticks per simulated second; also the default pacing rate.
    #[serde(default = "default_steps_per_second")]
    pub steps_per_second: f64,

    /// Maximum number of ticks before the run ends (0 = unlimited).
    #[serde(default)]
    pub max_ticks: u64,

    /// Maximum wall-clock seconds before the run ends (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,

    /// Whether to sleep off the remainder of each tick's wall-clock budget.
    #[serde(default = "default_true")]
    pub pace: bool,
}

impl Default for SimulationBoundsConfig {
    fn default() -> Self {
        Self {
            steps_per_second: default_steps_per_second(),
            max_ticks: 0,
            max_real_time_seconds: 0,
            pace: true,
        }
    }
}

/// Shape and parameters of the generated organism.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrganismConfig {
    /// Organism identity.
    #[serde(default = "default_organism_id")]
    pub id: String,

    /// Neurons in the neural circuit (chained N1 -> N2 -> ...).
    #[serde(default = "default_neurons")]
    pub neurons: u32,

    /// Muscle cells in the muscle group.
    #[serde(default = "default_muscles")]
    pub muscles: u32,

    /// Seed for synaptic weight generation.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Lower bound of generated synaptic weights.
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,

    /// Upper bound of generated synaptic weights.
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,

    /// Constant input current into the first neuron of the chain.
    #[serde(default = "default_base_current")]
    pub base_current: f64,
}

impl Default for OrganismConfig {
    fn default() -> Self {
        Self {
            id: default_organism_id(),
            neurons: default_neurons(),
            muscles: default_muscles(),
            seed: default_seed(),
            min_weight: default_min_weight(),
            max_weight: default_max_weight(),
            base_current: default_base_current(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Log the organism snapshot every N ticks (0 = never).
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            snapshot_interval_ticks: default_snapshot_interval_ticks(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_steps_per_second() -> f64 {
    100.0
}

const fn default_true() -> bool {
    true
}

fn default_organism_id() -> String {
    "worm1".to_owned()
}

const fn default_neurons() -> u32 {
    4
}

const fn default_muscles() -> u32 {
    2
}

const fn default_seed() -> u64 {
    42
}

const fn default_min_weight() -> f64 {
    1.0
}

const fn default_max_weight() -> f64 {
    2.0
}

const fn default_base_current() -> f64 {
    1.6
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_snapshot_interval_ticks() -> u64 {
    100
}
