//! Error types for the simulation binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and simulation execution.

/// Top-level error for the simulation binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: mict_core::config::ConfigError,
    },

    /// Simulation clock initialization failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: mict_core::clock::ClockError,
    },

    /// Organism construction failed.
    #[error("model error: {source}")]
    Model {
        /// The underlying model error.
        #[from]
        source: mict_models::ModelError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: mict_core::runner::RunnerError,
    },
}
