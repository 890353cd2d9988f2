//! The state of one run: configuration, X, Y, a, and the per-round averages.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::SaxpyConfig;
use crate::engine::{run_sequential, Engine, EngineOptions};
use crate::error::{Result, SaxpyError};
use crate::partition::partition;

#[derive(Debug, Clone)]
pub struct SaxpyContext {
    config: SaxpyConfig,
    x: Vec<f64>,
    y: Vec<f64>,
    a: f64,
    y_avgs: Vec<f64>,
}

impl SaxpyContext {
    /// Validates `config` and fills X, Y and a from its seed.
    ///
    /// X[i] and Y[i] are drawn alternately for each index, then a, all
    /// uniform in `[0, 1)`.
    pub fn seeded(config: SaxpyConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut x = Vec::with_capacity(config.len);
        let mut y = Vec::with_capacity(config.len);
        for _ in 0..config.len {
            x.push(rng.gen::<f64>());
            y.push(rng.gen::<f64>());
        }
        let a = rng.gen::<f64>();

        debug!("vector X = {x:?}");
        debug!("vector Y = {y:?}");
        debug!("a = {a}");

        Ok(Self {
            config,
            x,
            y,
            a,
            y_avgs: Vec::new(),
        })
    }

    /// Builds a context from caller-supplied vectors. `config.len` must match
    /// both of them.
    pub fn new(config: SaxpyConfig, x: Vec<f64>, y: Vec<f64>, a: f64) -> Result<Self> {
        config.validate()?;
        if x.len() != y.len() {
            return Err(SaxpyError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if x.len() != config.len {
            return Err(SaxpyError::ConfigLengthMismatch {
                expected: config.len,
                actual: x.len(),
            });
        }
        Ok(Self {
            config,
            x,
            y,
            a,
            y_avgs: Vec::new(),
        })
    }

    /// Runs on a fresh pool of `config.threads` workers with the default
    /// accumulator.
    pub fn run(&mut self) -> Result<&[f64]> {
        let engine = Engine::new(EngineOptions::new(self.config.threads))?;
        self.run_on(&engine)
    }

    /// Runs on an existing engine, which must have `config.threads` workers.
    pub fn run_on(&mut self, engine: &Engine) -> Result<&[f64]> {
        let ranges = partition(self.config.len, self.config.threads)?;
        self.y_avgs = engine.run(&self.x, &mut self.y, self.a, &ranges, self.config.max_iters)?;
        debug!("final vector Y = {:?}", self.y);
        Ok(&self.y_avgs)
    }

    /// Runs single-threaded on this context's current X and Y, leaving the
    /// context untouched. Returns the final Y and the per-round averages.
    pub fn run_reference(&self) -> (Vec<f64>, Vec<f64>) {
        let mut y = self.y.clone();
        let avgs = run_sequential(&self.x, &mut y, self.a, self.config.max_iters);
        (y, avgs)
    }

    pub fn config(&self) -> &SaxpyConfig {
        &self.config
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    /// Per-round averages of the last run, empty before any run.
    pub fn y_avgs(&self) -> &[f64] {
        &self.y_avgs
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.y, self.y_avgs)
    }
}
