use serde::Serialize;

use crate::error::{Result, SaxpyError};

pub const DEFAULT_LEN: usize = 10_000_000;
pub const DEFAULT_SEED: u64 = 1;
pub const DEFAULT_THREADS: usize = 1;
pub const DEFAULT_MAX_ITERS: usize = 1000;

/// Largest vector the engine accepts (a signed 32-bit index).
pub const MAX_LEN: usize = i32::MAX as usize;

/// Run parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaxpyConfig {
    /// Vector size P.
    pub len: usize,
    /// Seed for the X/Y/a generator.
    pub seed: u64,
    /// Worker count N.
    pub threads: usize,
    /// Number of rounds.
    pub max_iters: usize,
}

impl Default for SaxpyConfig {
    fn default() -> Self {
        Self {
            len: DEFAULT_LEN,
            seed: DEFAULT_SEED,
            threads: DEFAULT_THREADS,
            max_iters: DEFAULT_MAX_ITERS,
        }
    }
}

impl SaxpyConfig {
    pub fn new(len: usize, seed: u64, threads: usize, max_iters: usize) -> Self {
        Self {
            len,
            seed,
            threads,
            max_iters,
        }
    }

    /// Rejects out-of-range values. Nothing is clamped.
    pub fn validate(&self) -> Result<()> {
        if self.len == 0 {
            return Err(SaxpyError::EmptyVector);
        }
        if self.len > MAX_LEN {
            return Err(SaxpyError::VectorTooLong {
                len: self.len,
                max: MAX_LEN,
            });
        }
        if self.threads == 0 {
            return Err(SaxpyError::NoWorkers);
        }
        if self.max_iters == 0 {
            return Err(SaxpyError::NoIterations);
        }
        Ok(())
    }
}
