// Command line interface for the offer cache simulator
use std::path::PathBuf;
use clap::{Parser, Subcommand, Args};

use crate::config::AppConfig;
use crate::logging::LogFormat;

/// Offer cache simulator CLI
#[derive(Parser, Debug)]
#[command(name = "offercache-sim")]
#[command(about = "Drive a bounded offer cache with simulated producers, rescinds and workers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global command line arguments
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Configuration file path (YAML, or JSON by extension)
    #[arg(short, long, global = true, default_value = "offercache.yaml")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulation
    Run(RunArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigAction),
}

/// Simulation overrides; anything unset comes from the configuration file
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Maximum number of cached offers
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Number of offer producers
    #[arg(long)]
    pub producers: Option<usize>,

    /// Number of scheduling workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Fraction of issued offers to rescind (0.0 - 1.0)
    #[arg(long)]
    pub rescind_ratio: Option<f64>,

    /// Simulation length in seconds
    #[arg(short, long)]
    pub duration: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl GlobalArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

impl RunArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(capacity) = self.capacity {
            config.cache.capacity = capacity;
        }
        if let Some(producers) = self.producers {
            config.simulation.producers = producers;
        }
        if let Some(workers) = self.workers {
            config.simulation.workers = workers;
        }
        if let Some(ratio) = self.rescind_ratio {
            config.simulation.rescind_ratio = ratio;
        }
        if let Some(duration) = self.duration {
            config.simulation.duration_secs = duration;
        }
    }
}
