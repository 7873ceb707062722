//! Simulator configuration

use crate::error::{Result, SimulatorError};
use qfuse_state::MAX_KERNEL_WIDTH;
use std::str::FromStr;

/// Environment variable overriding [`SimulatorConfig::max_cluster_width`]
pub const ENV_FUSE_SPAN: &str = "QFUSE_FUSE_SPAN";
/// Environment variable overriding [`SimulatorConfig::max_cluster_depth`]
pub const ENV_FUSE_DEPTH: &str = "QFUSE_FUSE_DEPTH";
/// Environment variable overriding [`SimulatorConfig::num_threads`]
pub const ENV_NUM_THREADS: &str = "QFUSE_NUM_THREADS";
/// Environment variable overriding [`SimulatorConfig::max_pending_gates`]
pub const ENV_MAX_PENDING: &str = "QFUSE_MAX_PENDING";

const DEFAULT_MAX_CLUSTER_WIDTH: usize = 4;
const DEFAULT_MAX_PENDING_GATES: usize = 999;
const DEFAULT_MAX_THREADS: usize = 6;

/// Configuration for the simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Largest number of qubits a fused cluster may span
    ///
    /// Must not exceed the kernel dispatcher's width; the reference kernel
    /// accepts up to 7.
    ///
    /// Default: 4
    pub max_cluster_width: usize,

    /// Number of gates after which a cluster stops absorbing others
    ///
    /// Default: unbounded
    pub max_cluster_depth: usize,

    /// Queue length that forces an automatic flush
    ///
    /// Default: 999
    pub max_pending_gates: usize,

    /// Worker threads in the simulator's pool
    ///
    /// Default: available parallelism, capped at 6
    pub num_threads: usize,

    /// Random number generator seed for measurement
    ///
    /// If None, seeds from OS entropy.
    ///
    /// Default: None
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            max_cluster_width: DEFAULT_MAX_CLUSTER_WIDTH,
            max_cluster_depth: usize::MAX,
            max_pending_gates: DEFAULT_MAX_PENDING_GATES,
            num_threads: available.min(DEFAULT_MAX_THREADS),
            seed: None,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Widest fusion the reference kernel supports
    ///
    /// Larger clusters mean fewer passes over the amplitude vector at the
    /// cost of bigger matrices.
    pub fn wide() -> Self {
        Self {
            max_cluster_width: MAX_KERNEL_WIDTH,
            ..Default::default()
        }
    }

    /// One gate per kernel call on a single thread
    ///
    /// Useful as a reference when checking fused results.
    pub fn unfused() -> Self {
        Self {
            max_cluster_width: 1,
            max_cluster_depth: 1,
            num_threads: 1,
            ..Default::default()
        }
    }

    /// Deterministic single-threaded configuration
    pub fn debug() -> Self {
        Self {
            num_threads: 1,
            seed: Some(42),
            ..Default::default()
        }
    }

    /// Set the maximum cluster width
    pub fn with_max_cluster_width(mut self, width: usize) -> Self {
        self.max_cluster_width = width;
        self
    }

    /// Set the maximum cluster depth
    pub fn with_max_cluster_depth(mut self, depth: usize) -> Self {
        self.max_cluster_depth = depth;
        self
    }

    /// Set the automatic flush threshold
    pub fn with_max_pending_gates(mut self, limit: usize) -> Self {
        self.max_pending_gates = limit;
        self
    }

    /// Set the number of worker threads
    pub fn with_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Set the random seed for deterministic measurement
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Default configuration overridden by the `QFUSE_*` environment variables
    ///
    /// # Errors
    /// Returns [`SimulatorError::Configuration`] if a variable is set but is
    /// not a valid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Default configuration overridden by values from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(width) = parse_var(&lookup, ENV_FUSE_SPAN)? {
            config.max_cluster_width = width;
        }
        if let Some(depth) = parse_var(&lookup, ENV_FUSE_DEPTH)? {
            config.max_cluster_depth = depth;
        }
        if let Some(threads) = parse_var(&lookup, ENV_NUM_THREADS)? {
            config.num_threads = threads;
        }
        if let Some(pending) = parse_var(&lookup, ENV_MAX_PENDING)? {
            config.max_pending_gates = pending;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_cluster_width == 0 {
            return Err(SimulatorError::Configuration(
                "max_cluster_width must be > 0".to_string(),
            ));
        }
        if self.max_cluster_depth == 0 {
            return Err(SimulatorError::Configuration(
                "max_cluster_depth must be > 0".to_string(),
            ));
        }
        if self.max_pending_gates == 0 {
            return Err(SimulatorError::Configuration(
                "max_pending_gates must be > 0".to_string(),
            ));
        }
        if self.num_threads == 0 {
            return Err(SimulatorError::Configuration(
                "num_threads must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            SimulatorError::Configuration(format!("{} has invalid value {:?}", key, raw))
        }),
    }
}
