//! Iterative SAXPY (`Y = Y + a * X`) over a vector statically split across a
//! fixed pool of worker threads, recording the mean of Y after every round.
//!
//! ```no_run
//! use saxpy_threads::{partition, run};
//!
//! let x = vec![1.0; 10];
//! let mut y = vec![0.0; 10];
//! let ranges = partition(10, 3)?;
//! let avgs = run(&x, &mut y, 1.0, &ranges, 1)?;
//! assert_eq!(y, vec![1.0; 10]);
//! assert!((avgs[0] - 1.0).abs() < 1e-12);
//! # Ok::<(), saxpy_threads::SaxpyError>(())
//! ```

pub mod accumulator;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod partition;
pub mod report;

pub use accumulator::{
    Accumulator, AccumulatorKind, AtomicAverages, LockedAverages, SlotLockedAverages,
};
pub use config::SaxpyConfig;
pub use context::SaxpyContext;
pub use engine::{run, run_sequential, Engine, EngineOptions};
pub use error::{Result, SaxpyError};
pub use partition::{partition, validate_ranges};
pub use report::{OutputFormat, RunReport};
