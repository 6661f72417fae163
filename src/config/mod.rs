// Offer cache configuration
use serde::{Serialize, Deserialize};

use crate::logging::LoggingConfig;

pub mod manager;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
}

/// Offer cache sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of distinct offers held at once
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Load generator settings for the `offercache-sim` binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub producers: usize,
    pub workers: usize,
    /// Delay between offers from a single producer
    pub push_interval_ms: u64,
    /// Fraction of issued offers that get rescinded, 0.0 - 1.0
    pub rescind_ratio: f64,
    /// How long a worker waits for an offer before giving up on that round
    pub pop_timeout_ms: u64,
    /// Simulated time a worker spends scheduling against one offer
    pub work_time_ms: u64,
    pub duration_secs: u64,
    pub report_interval_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            producers: 2,
            workers: num_cpus::get(),
            push_interval_ms: 1,
            rescind_ratio: 0.1,
            pop_timeout_ms: 500,
            work_time_ms: 5,
            duration_secs: 10,
            report_interval_secs: 1,
        }
    }
}
