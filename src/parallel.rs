//! Parallel processing configuration and management
//!
//! Reductions and rasterisation use rayon. A configured thread count runs
//! the work inside a dedicated pool, so several pipelines in one process do
//! not fight over the global pool.

use crate::errors::Result;
use log::{debug, info};
use rayon::ThreadPoolBuilder;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    #[must_use]
    pub const fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// A configuration that uses all available CPU cores
    #[must_use]
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    #[must_use]
    pub const fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    /// Run `work` with the configured number of threads.
    ///
    /// Without a thread count the current (usually global) pool is used.
    ///
    /// # Errors
    ///
    /// Returns the pool construction error, or whatever `work` returns.
    pub fn install<T: Send>(&self, work: impl FnOnce() -> Result<T> + Send) -> Result<T> {
        match self.num_threads {
            Some(num_threads) => {
                let pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;
                info!("Configured parallel processing with {num_threads} threads");
                pool.install(work)
            }
            None => {
                debug!(
                    "Using default thread pool with {} threads",
                    rayon::current_num_threads()
                );
                work()
            }
        }
    }

    /// Number of threads `install` will run with
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(rayon::current_num_threads)
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

impl ParallelInfo {
    pub fn log_info(&self) {
        info!(
            "Parallel processing: {} threads, {} CPU cores, parallelism {}",
            self.current_threads, self.available_cores, self.available_parallelism
        );
    }
}

/// Get information about the current parallel configuration
#[must_use]
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1),
    }
}
