//! The parallel iteration engine.
//!
//! One worker per range runs every round over its own slice of Y and adds its
//! partial average into the shared accumulator. Workers only meet at that
//! accumulator, so a fast worker may be several rounds ahead of a slow one.
//! All of them are joined before results are handed back.

use std::ops::Range;

use log::{debug, info, trace, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::accumulator::{
    Accumulator, AccumulatorKind, AtomicAverages, LockedAverages, SlotLockedAverages,
};
use crate::error::{Result, SaxpyError};
use crate::partition::validate_ranges;

/// How to build an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub workers: usize,
    pub accumulator: AccumulatorKind,
    /// Pin worker `i` to core `i mod cores`.
    pub pin_threads: bool,
}

impl EngineOptions {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            accumulator: AccumulatorKind::default(),
            pin_threads: false,
        }
    }

    pub fn accumulator(mut self, kind: AccumulatorKind) -> Self {
        self.accumulator = kind;
        self
    }

    pub fn pin_threads(mut self, pin: bool) -> Self {
        self.pin_threads = pin;
        self
    }
}

/// A fixed pool of worker threads, one per range.
#[derive(Debug)]
pub struct Engine {
    pool: ThreadPool,
    options: EngineOptions,
}

impl Engine {
    /// Starts the worker threads. Failing to start any of them is fatal.
    pub fn new(options: EngineOptions) -> Result<Self> {
        if options.workers == 0 {
            return Err(SaxpyError::NoWorkers);
        }

        let mut builder = ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("saxpy-worker-{i}"));

        if options.pin_threads {
            match core_affinity::get_core_ids() {
                Some(cores) if !cores.is_empty() => {
                    builder = builder.start_handler(move |index| {
                        let core = cores[index % cores.len()];
                        if !core_affinity::set_for_current(core) {
                            warn!("could not pin worker {index} to core {}", core.id);
                        }
                    });
                }
                _ => warn!("core ids unavailable, workers will not be pinned"),
            }
        }

        let pool = builder.build()?;
        debug!(
            "started {} workers (accumulator={}, pinned={})",
            options.workers,
            options.accumulator.as_str(),
            options.pin_threads
        );
        Ok(Self { pool, options })
    }

    pub fn workers(&self) -> usize {
        self.options.workers
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Runs `max_iters` rounds of `y += a * x`, mutating `y` in place, and
    /// returns the average of `y` after each round.
    pub fn run(
        &self,
        x: &[f64],
        y: &mut [f64],
        a: f64,
        ranges: &[Range<usize>],
        max_iters: usize,
    ) -> Result<Vec<f64>> {
        match self.options.accumulator {
            AccumulatorKind::Coarse => {
                self.run_into(LockedAverages::new(max_iters), x, y, a, ranges, max_iters)
            }
            AccumulatorKind::Slot => {
                self.run_into(SlotLockedAverages::new(max_iters), x, y, a, ranges, max_iters)
            }
            AccumulatorKind::Atomic => {
                self.run_into(AtomicAverages::new(max_iters), x, y, a, ranges, max_iters)
            }
        }
    }

    fn run_into<A: Accumulator>(
        &self,
        acc: A,
        x: &[f64],
        y: &mut [f64],
        a: f64,
        ranges: &[Range<usize>],
        max_iters: usize,
    ) -> Result<Vec<f64>> {
        self.run_with(x, y, a, ranges, max_iters, &acc)?;
        Ok(acc.into_averages())
    }

    /// Same as [`Engine::run`] but contributes into a caller-supplied
    /// accumulator, which must hold at least `max_iters` rounds.
    pub fn run_with<A: Accumulator>(
        &self,
        x: &[f64],
        y: &mut [f64],
        a: f64,
        ranges: &[Range<usize>],
        max_iters: usize,
        acc: &A,
    ) -> Result<()> {
        if x.len() != y.len() {
            return Err(SaxpyError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if y.is_empty() {
            return Err(SaxpyError::EmptyVector);
        }
        if acc.rounds() < max_iters {
            return Err(SaxpyError::AccumulatorTooSmall {
                rounds: acc.rounds(),
                max_iters,
            });
        }
        if ranges.len() != self.options.workers {
            return Err(SaxpyError::WorkerCountMismatch {
                ranges: ranges.len(),
                workers: self.options.workers,
            });
        }
        validate_ranges(y.len(), ranges)?;

        let len = y.len() as f64;
        info!(
            "running {max_iters} rounds over {} elements on {} workers",
            y.len(),
            self.options.workers
        );

        // Hand each worker the disjoint slice of Y it owns.
        let mut rest = y;
        let mut shares = Vec::with_capacity(ranges.len());
        for range in ranges {
            let (own, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            shares.push((range.clone(), &x[range.clone()], own));
            rest = tail;
        }

        self.pool.scope(|s| {
            for (id, (range, xs, ys)) in shares.into_iter().enumerate() {
                s.spawn(move |_| {
                    trace!("worker {id} owns {}..{}", range.start, range.end);
                    sweep(xs, ys, a, len, max_iters, acc);
                    trace!("worker {id} done");
                });
            }
        });

        Ok(())
    }
}

/// Runs every round over one worker's slice.
fn sweep<A: Accumulator>(x: &[f64], y: &mut [f64], a: f64, len: f64, max_iters: usize, acc: &A) {
    for round in 0..max_iters {
        let mut total = 0.0;
        for (yj, &xj) in y.iter_mut().zip(x) {
            *yj += a * xj;
            total += *yj;
        }
        acc.contribute(round, total / len);
    }
}

/// Runs the engine on a fresh pool sized to `ranges`, using the coarse lock.
pub fn run(
    x: &[f64],
    y: &mut [f64],
    a: f64,
    ranges: &[Range<usize>],
    max_iters: usize,
) -> Result<Vec<f64>> {
    Engine::new(EngineOptions::new(ranges.len()))?.run(x, y, a, ranges, max_iters)
}

/// Single-threaded reference with the same update and summation order as a
/// one-worker run.
pub fn run_sequential(x: &[f64], y: &mut [f64], a: f64, max_iters: usize) -> Vec<f64> {
    let len = y.len() as f64;
    let mut avgs = Vec::with_capacity(max_iters);
    for _ in 0..max_iters {
        let mut total = 0.0;
        for (yj, &xj) in y.iter_mut().zip(x) {
            *yj += a * xj;
            total += *yj;
        }
        avgs.push(total / len);
    }
    avgs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const EPSILON: f64 = 1e-12;

    struct CountingAverages {
        inner: LockedAverages,
        counts: Vec<AtomicUsize>,
    }

    impl CountingAverages {
        fn new(rounds: usize) -> Self {
            Self {
                inner: LockedAverages::new(rounds),
                counts: (0..rounds).map(|_| AtomicUsize::new(0)).collect(),
            }
        }
    }

    impl Accumulator for CountingAverages {
        fn contribute(&self, round: usize, partial: f64) {
            self.counts[round].fetch_add(1, Ordering::SeqCst);
            self.inner.contribute(round, partial);
        }

        fn rounds(&self) -> usize {
            self.inner.rounds()
        }

        fn into_averages(self) -> Vec<f64> {
            self.inner.into_averages()
        }
    }

    #[test]
    fn test_ten_elements_three_workers() {
        let ranges = partition(10, 3).unwrap();
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);

        let x = vec![1.0; 10];
        let mut y = vec![0.0; 10];
        let avgs = run(&x, &mut y, 1.0, &ranges, 1).unwrap();

        assert_eq!(y, vec![1.0; 10]);
        assert_eq!(avgs.len(), 1);
        assert!((avgs[0] - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_four_elements_four_workers_two_rounds() {
        let ranges = partition(4, 4).unwrap();
        let x = vec![1.0; 4];
        let mut y = vec![0.0; 4];
        let avgs = run(&x, &mut y, 2.0, &ranges, 2).unwrap();

        assert_eq!(y, vec![4.0; 4]);
        assert_eq!(avgs, vec![2.0, 4.0]);
    }

    #[test]
    fn test_every_slot_gets_one_contribution_per_worker() {
        for workers in [1, 2, 3, 5, 8] {
            let len = 101;
            let rounds = 25;
            let ranges = partition(len, workers).unwrap();
            let engine = Engine::new(EngineOptions::new(workers)).unwrap();

            let x: Vec<f64> = (0..len).map(|i| i as f64).collect();
            let mut y = vec![0.0; len];
            let acc = CountingAverages::new(rounds);
            engine.run_with(&x, &mut y, 0.5, &ranges, rounds, &acc).unwrap();

            for count in &acc.counts {
                assert_eq!(count.load(Ordering::SeqCst), workers);
            }
        }
    }

    #[test]
    fn test_idle_workers_still_contribute() {
        let ranges = partition(2, 4).unwrap();
        let engine = Engine::new(EngineOptions::new(4)).unwrap();
        let acc = CountingAverages::new(3);
        let mut y = vec![0.0; 2];
        engine.run_with(&[1.0, 3.0], &mut y, 1.0, &ranges, 3, &acc).unwrap();

        assert!(acc.counts.iter().all(|c| c.load(Ordering::SeqCst) == 4));
        assert_eq!(y, vec![3.0, 9.0]);
        assert_eq!(acc.into_averages(), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_accumulator_kinds_agree() {
        let len = 1000;
        let x: Vec<f64> = (0..len).map(|i| (i % 7) as f64 * 0.25).collect();
        let ranges = partition(len, 6).unwrap();

        let mut results = Vec::new();
        for kind in [
            AccumulatorKind::Coarse,
            AccumulatorKind::Slot,
            AccumulatorKind::Atomic,
        ] {
            let engine = Engine::new(EngineOptions::new(6).accumulator(kind)).unwrap();
            let mut y = vec![1.0; len];
            let avgs = engine.run(&x, &mut y, 0.3, &ranges, 10).unwrap();
            results.push((y, avgs));
        }

        let (y0, avgs0) = &results[0];
        for (y, avgs) in &results[1..] {
            assert_eq!(y, y0);
            for (a, b) in avgs.iter().zip(avgs0) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_single_worker_matches_sequential() {
        let len = 513;
        let x: Vec<f64> = (0..len).map(|i| 1.0 / (i + 1) as f64).collect();
        let y0: Vec<f64> = (0..len).map(|i| (i as f64).sin()).collect();

        let mut expected_y = y0.clone();
        let expected = run_sequential(&x, &mut expected_y, 0.7, 12);

        let mut y = y0;
        let avgs = run(&x, &mut y, 0.7, &partition(len, 1).unwrap(), 12).unwrap();

        assert_eq!(y, expected_y);
        assert_eq!(avgs, expected);
    }

    #[test]
    fn test_pinned_pool_runs() {
        let engine = Engine::new(EngineOptions::new(2).pin_threads(true)).unwrap();
        let ranges = partition(8, 2).unwrap();
        let mut y = vec![0.0; 8];
        let avgs = engine.run(&[1.0; 8], &mut y, 1.0, &ranges, 2).unwrap();
        assert_eq!(avgs, vec![1.0, 2.0]);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let engine = Engine::new(EngineOptions::new(1)).unwrap();
        let mut y = vec![0.0; 3];
        let err = engine.run(&[1.0; 4], &mut y, 1.0, &[0..3], 1).unwrap_err();
        assert!(matches!(err, SaxpyError::LengthMismatch { x: 4, y: 3 }));
    }

    #[test]
    fn test_rejects_wrong_range_count() {
        let engine = Engine::new(EngineOptions::new(2)).unwrap();
        let mut y = vec![0.0; 4];
        let err = engine.run(&[1.0; 4], &mut y, 1.0, &[0..4], 1).unwrap_err();
        assert!(matches!(
            err,
            SaxpyError::WorkerCountMismatch {
                ranges: 1,
                workers: 2
            }
        ));
    }

    #[test]
    fn test_rejects_bad_ranges_before_touching_y() {
        let engine = Engine::new(EngineOptions::new(2)).unwrap();
        let mut y = vec![0.0; 4];
        let err = engine.run(&[1.0; 4], &mut y, 1.0, &[0..2, 3..4], 1).unwrap_err();
        assert!(matches!(err, SaxpyError::InvalidPartition { .. }));
        assert_eq!(y, vec![0.0; 4]);
    }

    #[test]
    fn test_empty_vector_rejected() {
        let mut y: Vec<f64> = Vec::new();
        assert!(matches!(
            run(&[], &mut y, 1.0, &[0..0], 2),
            Err(SaxpyError::EmptyVector)
        ));

        let engine = Engine::new(EngineOptions::new(2).accumulator(AccumulatorKind::Atomic)).unwrap();
        assert!(matches!(
            engine.run(&[], &mut y, 1.0, &[0..0, 0..0], 2),
            Err(SaxpyError::EmptyVector)
        ));
    }

    #[test]
    fn test_undersized_accumulator_rejected() {
        let engine = Engine::new(EngineOptions::new(2)).unwrap();
        let acc = CountingAverages::new(2);
        let mut y = vec![0.0; 4];
        let err = engine
            .run_with(&[1.0; 4], &mut y, 1.0, &partition(4, 2).unwrap(), 3, &acc)
            .unwrap_err();

        assert!(matches!(
            err,
            SaxpyError::AccumulatorTooSmall {
                rounds: 2,
                max_iters: 3
            }
        ));
        assert_eq!(y, vec![0.0; 4]);
        assert!(acc.counts.iter().all(|c| c.load(Ordering::SeqCst) == 0));
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            Engine::new(EngineOptions::new(0)),
            Err(SaxpyError::NoWorkers)
        ));
        let mut y = vec![0.0; 2];
        assert!(matches!(
            run(&[0.0; 2], &mut y, 1.0, &[], 1),
            Err(SaxpyError::NoWorkers)
        ));
    }
}
