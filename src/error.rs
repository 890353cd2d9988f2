use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SaxpyError>;

/// Everything that can stop a run before the first worker starts.
///
/// Once workers are running the loop bodies cannot fail, so none of these are
/// raised mid-run.
#[derive(Debug, Error)]
pub enum SaxpyError {
    #[error("vector size must be positive")]
    EmptyVector,

    #[error("vector size {len} exceeds the maximum of {max}")]
    VectorTooLong { len: usize, max: usize },

    #[error("thread count must be positive")]
    NoWorkers,

    #[error("iteration count must be positive")]
    NoIterations,

    #[error("X has {x} elements but Y has {y}")]
    LengthMismatch { x: usize, y: usize },

    #[error("configured vector size is {expected} but the vectors hold {actual} elements")]
    ConfigLengthMismatch { expected: usize, actual: usize },

    #[error("accumulator holds {rounds} rounds but {max_iters} were requested")]
    AccumulatorTooSmall { rounds: usize, max_iters: usize },

    #[error("invalid partition: {reason}")]
    InvalidPartition { reason: String },

    #[error("{ranges} ranges supplied for a pool of {workers} workers")]
    WorkerCountMismatch { ranges: usize, workers: usize },

    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
