//! Shared per-round averages that all workers add into.
//!
//! Every slot receives one partial contribution per worker per round. The
//! implementations differ only in how they keep those read-modify-writes from
//! interleaving.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use clap::ValueEnum;
use serde::Serialize;

/// Destination for per-round partial sums.
pub trait Accumulator: Sync {
    /// Adds `partial` into slot `round`. Must be atomic with respect to every
    /// other `contribute` on the same slot.
    fn contribute(&self, round: usize, partial: f64);

    /// Number of round slots available.
    fn rounds(&self) -> usize;

    /// Consumes the accumulator once all workers are joined.
    fn into_averages(self) -> Vec<f64>
    where
        Self: Sized;
}

/// Selects an accumulator implementation at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AccumulatorKind {
    /// One lock guarding every slot.
    #[default]
    Coarse,
    /// One lock per slot.
    Slot,
    /// Compare-and-swap on the bit pattern of each slot.
    Atomic,
}

impl AccumulatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccumulatorKind::Coarse => "coarse",
            AccumulatorKind::Slot => "slot",
            AccumulatorKind::Atomic => "atomic",
        }
    }
}

/// Single mutex over the whole averages vector.
#[derive(Debug)]
pub struct LockedAverages {
    slots: Mutex<Vec<f64>>,
}

impl LockedAverages {
    pub fn new(rounds: usize) -> Self {
        Self {
            slots: Mutex::new(vec![0.0; rounds]),
        }
    }
}

impl Accumulator for LockedAverages {
    fn contribute(&self, round: usize, partial: f64) {
        // the guarded section is a single add, a poisoned guard still holds
        // a consistent value
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots[round] += partial;
    }

    fn rounds(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn into_averages(self) -> Vec<f64> {
        self.slots.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One mutex per round.
#[derive(Debug)]
pub struct SlotLockedAverages {
    slots: Vec<Mutex<f64>>,
}

impl SlotLockedAverages {
    pub fn new(rounds: usize) -> Self {
        Self {
            slots: (0..rounds).map(|_| Mutex::new(0.0)).collect(),
        }
    }
}

impl Accumulator for SlotLockedAverages {
    fn contribute(&self, round: usize, partial: f64) {
        let mut slot = self.slots[round]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot += partial;
    }

    fn rounds(&self) -> usize {
        self.slots.len()
    }

    fn into_averages(self) -> Vec<f64> {
        self.slots
            .into_iter()
            .map(|slot| slot.into_inner().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }
}

// Keeps neighbouring slots off the same cache line.
#[repr(align(64))]
#[derive(Debug)]
struct PaddedAtomicF64(AtomicU64);

/// Lock-free slots holding `f64` bit patterns.
#[derive(Debug)]
pub struct AtomicAverages {
    slots: Vec<PaddedAtomicF64>,
}

impl AtomicAverages {
    pub fn new(rounds: usize) -> Self {
        Self {
            slots: (0..rounds)
                .map(|_| PaddedAtomicF64(AtomicU64::new(0.0f64.to_bits())))
                .collect(),
        }
    }
}

impl Accumulator for AtomicAverages {
    fn contribute(&self, round: usize, partial: f64) {
        let slot = &self.slots[round].0;
        let mut current = slot.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + partial).to_bits();
            match slot.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    fn rounds(&self) -> usize {
        self.slots.len()
    }

    fn into_averages(self) -> Vec<f64> {
        self.slots
            .into_iter()
            .map(|slot| f64::from_bits(slot.0.into_inner()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const EPSILON: f64 = 1e-9;

    fn hammer<A: Accumulator>(acc: &A, threads: usize, rounds: usize) {
        thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    for _ in 0..1000 {
                        for round in 0..rounds {
                            acc.contribute(round, 0.5);
                        }
                    }
                });
            }
        });
    }

    fn check_no_lost_updates<A: Accumulator>(acc: A) {
        hammer(&acc, 8, 4);
        for avg in acc.into_averages() {
            // 8 threads * 1000 adds of 0.5, exact in binary
            assert_eq!(avg, 4000.0);
        }
    }

    #[test]
    fn test_locked_no_lost_updates() {
        check_no_lost_updates(LockedAverages::new(4));
    }

    #[test]
    fn test_slot_locked_no_lost_updates() {
        check_no_lost_updates(SlotLockedAverages::new(4));
    }

    #[test]
    fn test_atomic_no_lost_updates() {
        check_no_lost_updates(AtomicAverages::new(4));
    }

    #[test]
    fn test_slots_are_independent() {
        let acc = AtomicAverages::new(3);
        acc.contribute(0, 1.25);
        acc.contribute(2, -0.75);
        acc.contribute(2, 0.1);
        let avgs = acc.into_averages();
        assert_eq!(avgs[0], 1.25);
        assert_eq!(avgs[1], 0.0);
        assert!((avgs[2] - (-0.65)).abs() < EPSILON);
    }

    #[test]
    fn test_fresh_accumulators_are_zeroed() {
        assert_eq!(LockedAverages::new(2).into_averages(), vec![0.0, 0.0]);
        assert_eq!(SlotLockedAverages::new(2).into_averages(), vec![0.0, 0.0]);
        assert_eq!(AtomicAverages::new(2).into_averages(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_rounds_match_requested_size() {
        assert_eq!(LockedAverages::new(5).rounds(), 5);
        assert_eq!(SlotLockedAverages::new(0).rounds(), 0);
        assert_eq!(AtomicAverages::new(3).rounds(), 3);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(AccumulatorKind::default(), AccumulatorKind::Coarse);
        assert_eq!(AccumulatorKind::Slot.as_str(), "slot");
        assert_eq!(
            serde_json::to_string(&AccumulatorKind::Atomic).unwrap(),
            "\"atomic\""
        );
    }
}
