//! Error types for the lanesim driver binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during driver startup and simulation execution.

/// Top-level error for the driver binary.
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
        source: lanesim_core::config::ConfigError,
    },

    /// The simulation returned a protocol or scheduling error.
    #[error("simulation error: {source}")]
    Sim {
        /// The underlying simulation error.
        #[from]
        source: lanesim_core::error::SimError,
    },

    /// Writing the run report failed.
    #[error("report error: {message}")]
    Report {
        /// Description of the report failure.
        message: String,
    },
}
