//! Configuration loading and typed config structures for lanesim.
//!
//! The canonical configuration lives in `lanesim-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every field has a default matching the behavior of the reference
//! simulation, so an absent file or a partial file is always usable.

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

    /// A configuration value is outside its legal range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `lanesim-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimConfig {
    /// Topology bounds and initial layout.
    #[serde(default)]
    pub topology: TopologyConfig,

    /// Queue admission parameters.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Travel speed and leg distances for the Motion capability.
    #[serde(default)]
    pub motion: MotionConfig,

    /// Server processing parameters.
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Workload generation parameters (consumed by the driver).
    #[serde(default)]
    pub workload: WorkloadConfig,
}

impl SimConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all values are within their legal ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "queue.capacity must be at least 1".to_owned(),
            });
        }
        if self.motion.speed == 0 {
            return Err(ConfigError::Invalid {
                reason: "motion.speed must be at least 1 unit/sec".to_owned(),
            });
        }
        if self.topology.min_lanes > self.topology.initial_lanes {
            return Err(ConfigError::Invalid {
                reason: "topology.min_lanes must not exceed topology.initial_lanes".to_owned(),
            });
        }
        if self.topology.initial_lanes > self.topology.max_lanes {
            return Err(ConfigError::Invalid {
                reason: "topology.initial_lanes must not exceed topology.max_lanes".to_owned(),
            });
        }
        if self.workload.interval_millis == 0 {
            return Err(ConfigError::Invalid {
                reason: "workload.interval_millis must be at least 1".to_owned(),
            });
        }
        if self.workload.high_priority_percent > 100 {
            return Err(ConfigError::Invalid {
                reason: "workload.high_priority_percent must be 0-100".to_owned(),
            });
        }
        Ok(())
    }
}

/// Topology bounds and initial layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopologyConfig {
    /// Number of queue/server lanes registered at startup.
    #[serde(default = "default_initial_lanes")]
    pub initial_lanes: usize,

    /// Upper bound on registered lanes (`add_lane` refuses beyond this).
    #[serde(default = "default_max_lanes")]
    pub max_lanes: usize,

    /// Lower bound on registered lanes (`remove_lane` refuses below this).
    #[serde(default = "default_min_lanes")]
    pub min_lanes: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            initial_lanes: default_initial_lanes(),
            max_lanes: default_max_lanes(),
            min_lanes: default_min_lanes(),
        }
    }
}

/// Queue admission parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of entries a queue holds. Fixed at queue creation.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Travel speed and leg distances.
///
/// Distances are abstract scene units; speed is units per second. The
/// Motion capability converts a leg into a timer via
/// `duration = distance / speed`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MotionConfig {
    /// Travel speed in units per second.
    #[serde(default = "default_speed")]
    pub speed: u64,

    /// Distance from a client's spawn point to a queue boundary.
    #[serde(default = "default_spawn_to_queue")]
    pub spawn_to_queue: u64,

    /// Distance from a client's spawn point to a server boundary
    /// (direct and bypass sends).
    #[serde(default = "default_spawn_to_server")]
    pub spawn_to_server: u64,

    /// Distance from a queue's front slot to its paired server's boundary.
    #[serde(default = "default_queue_to_server")]
    pub queue_to_server: u64,

    /// Distance from a server's boundary to its center, where processing
    /// begins.
    #[serde(default = "default_server_edge_to_center")]
    pub server_edge_to_center: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            spawn_to_queue: default_spawn_to_queue(),
            spawn_to_server: default_spawn_to_server(),
            queue_to_server: default_queue_to_server(),
            server_edge_to_center: default_server_edge_to_center(),
        }
    }
}

/// Server processing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessingConfig {
    /// Fixed processing duration in microseconds, measured from the moment
    /// a request reaches the server's center.
    #[serde(default = "default_processing_micros")]
    pub duration_micros: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            duration_micros: default_processing_micros(),
        }
    }
}

/// Workload generation parameters, consumed by the driver binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkloadConfig {
    /// Base interval between sends, in milliseconds.
    #[serde(default = "default_interval_millis")]
    pub interval_millis: u64,

    /// Maximum random jitter added to each interval, in milliseconds.
    #[serde(default = "default_jitter_millis")]
    pub jitter_millis: u64,

    /// Total number of requests to send over the run.
    #[serde(default = "default_request_count")]
    pub request_count: u64,

    /// Percentage (0-100) of requests sent by the high-priority client.
    #[serde(default = "default_high_priority_percent")]
    pub high_priority_percent: u8,

    /// RNG seed for reproducible workloads.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            interval_millis: default_interval_millis(),
            jitter_millis: default_jitter_millis(),
            request_count: default_request_count(),
            high_priority_percent: default_high_priority_percent(),
            seed: default_seed(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_initial_lanes() -> usize {
    1
}

const fn default_max_lanes() -> usize {
    3
}

const fn default_min_lanes() -> usize {
    1
}

const fn default_capacity() -> usize {
    4
}

const fn default_speed() -> u64 {
    1_200
}

const fn default_spawn_to_queue() -> u64 {
    300
}

const fn default_spawn_to_server() -> u64 {
    700
}

const fn default_queue_to_server() -> u64 {
    400
}

const fn default_server_edge_to_center() -> u64 {
    50
}

const fn default_processing_micros() -> u64 {
    1_100_000
}

const fn default_interval_millis() -> u64 {
    1_500
}

const fn default_jitter_millis() -> u64 {
    0
}

const fn default_request_count() -> u64 {
    100
}

const fn default_high_priority_percent() -> u8 {
    0
}

const fn default_seed() -> u64 {
    42
}
