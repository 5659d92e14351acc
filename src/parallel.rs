//! Thread pool configuration
//!
//! The global Rayon pool serves the statistics reductions. Each warp builds
//! a dedicated pool shared by all of its slices, so the resampler's thread
//! count stays fixed no matter how the global pool is configured.

use crate::errors::{Result, RuNeGridError};
use log::info;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Worker threads; `None` lets Rayon decide
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Use every available CPU core
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Configure the global Rayon pool. Can only succeed once per process.
    pub fn setup_global_pool(&self) -> Result<()> {
        match self.num_threads {
            Some(num_threads) => {
                ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build_global()
                    .map_err(|e| {
                        RuNeGridError::ThreadPoolError(format!(
                            "Failed to initialize thread pool with {num_threads} threads: {e}"
                        ))
                    })?;
                info!("Configured parallel processing with {num_threads} threads");
            }
            None => info!("Using default thread pool configuration"),
        }
        Ok(())
    }

    /// Build a standalone pool with this configuration
    pub fn build_pool(&self) -> Result<ThreadPool> {
        let mut builder = ThreadPoolBuilder::new();
        if let Some(num_threads) = self.num_threads {
            builder = builder.num_threads(num_threads);
        }
        builder.build().map_err(|e| {
            RuNeGridError::ThreadPoolError(format!("Failed to build thread pool: {e}"))
        })
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
}

/// Get information about the current parallel configuration
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
    }
}

impl ParallelInfo {
    pub fn print_info(&self) {
        println!("Parallel processing:");
        println!("   Current threads: {}", self.current_threads);
        println!("   Available CPU cores: {}", self.available_cores);
    }
}
