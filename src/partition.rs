//! Static partitioning of `[0, len)` into one contiguous range per worker.

use std::ops::Range;

use log::warn;

use crate::error::{Result, SaxpyError};

/// Splits `[0, len)` into `workers` contiguous ranges whose sizes differ by at
/// most one. The first `len % workers` ranges carry the extra element.
pub fn partition(len: usize, workers: usize) -> Result<Vec<Range<usize>>> {
    if len == 0 {
        return Err(SaxpyError::EmptyVector);
    }
    if workers == 0 {
        return Err(SaxpyError::NoWorkers);
    }
    if workers > len {
        warn!("{workers} workers for {len} elements, {} will sit idle", workers - len);
    }

    let chunk = len / workers;
    let rest = len % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut ini = 0;
    for i in 0..workers {
        let extra = if i < rest { 1 } else { 0 };
        let end = ini + chunk + extra;
        ranges.push(ini..end);
        ini = end;
    }
    Ok(ranges)
}

/// Checks that `ranges` starts at 0, has no gaps or overlaps, and ends at `len`.
pub fn validate_ranges(len: usize, ranges: &[Range<usize>]) -> Result<()> {
    if ranges.is_empty() {
        return Err(SaxpyError::NoWorkers);
    }

    let mut expected = 0;
    for (i, range) in ranges.iter().enumerate() {
        if range.start != expected {
            return Err(SaxpyError::InvalidPartition {
                reason: format!(
                    "range {i} starts at {} but the previous one ended at {expected}",
                    range.start
                ),
            });
        }
        if range.end < range.start {
            return Err(SaxpyError::InvalidPartition {
                reason: format!("range {i} is reversed ({}..{})", range.start, range.end),
            });
        }
        expected = range.end;
    }

    if expected != len {
        return Err(SaxpyError::InvalidPartition {
            reason: format!("ranges cover [0, {expected}) but the vector has {len} elements"),
        });
    }
    Ok(())
}
