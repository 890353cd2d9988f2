// Strong scaling: fixed vector size, increasing thread counts.
//
// Every run starts from the same seeded X, Y and a. Final Y must match the
// one-thread run bit for bit; Y_avgs only within a relative tolerance, since
// the order partial sums land in depends on the partition.

use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};

use saxpy_threads::{AccumulatorKind, Engine, EngineOptions, SaxpyConfig, SaxpyContext};

const THREAD_COUNTS: [usize; 5] = [1, 2, 4, 8, 16];
const EPSILON: f64 = 1e-9;

#[derive(Debug, Parser)]
#[command(name = "saxpy_scaling", about = "Strong-scaling study for parallel SAXPY")]
struct Cli {
    /// Vector size
    #[arg(short = 'p', long = "len", default_value_t = 1_000_000)]
    len: usize,

    #[arg(short = 's', long, default_value_t = 1)]
    seed: u64,

    /// Number of rounds
    #[arg(short = 'i', long = "iters", default_value_t = 100)]
    max_iters: usize,

    #[arg(long, value_enum, default_value_t = AccumulatorKind::Coarse)]
    accumulator: AccumulatorKind,

    #[arg(long)]
    pin: bool,
}

struct Sample {
    threads: usize,
    time: f64,
    y: Vec<f64>,
    y_avgs: Vec<f64>,
}

fn run_once(cli: &Cli, threads: usize) -> anyhow::Result<Sample> {
    let config = SaxpyConfig::new(cli.len, cli.seed, threads, cli.max_iters);
    let mut ctx = SaxpyContext::seeded(config).context("invalid configuration")?;
    let engine = Engine::new(
        EngineOptions::new(threads)
            .accumulator(cli.accumulator)
            .pin_threads(cli.pin),
    )?;

    let start = Instant::now();
    ctx.run_on(&engine)?;
    let time = start.elapsed().as_secs_f64();

    let (y, y_avgs) = ctx.into_parts();
    Ok(Sample {
        threads,
        time,
        y,
        y_avgs,
    })
}

fn averages_match(baseline: &[f64], other: &[f64]) -> bool {
    baseline.len() == other.len()
        && baseline
            .iter()
            .zip(other)
            .all(|(b, o)| (b - o).abs() <= EPSILON * b.abs().max(1.0))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    println!("=== Rust SAXPY Benchmark (Scalability) ===");
    println!(
        "P = {}, iterations = {}, seed = {}, accumulator = {}",
        cli.len,
        cli.max_iters,
        cli.seed,
        cli.accumulator.as_str()
    );
    println!("Testing thread counts: {:?}", THREAD_COUNTS);
    println!();

    let mut baseline: Option<Sample> = None;
    let mut mismatches = 0;

    for threads in THREAD_COUNTS {
        info!("running with {threads} threads");
        let sample = run_once(&cli, threads)?;

        match &baseline {
            None => {
                println!("Threads = {:2}  Time: {:.6}s (baseline)", threads, sample.time);
            }
            Some(base) => {
                let speedup = base.time / sample.time;
                let efficiency = speedup / threads as f64;
                println!(
                    "Threads = {:2}  Time: {:.6}s, Speedup: {:.2}x, Efficiency: {:.2}%",
                    threads,
                    sample.time,
                    speedup,
                    efficiency * 100.0
                );

                if sample.y != base.y {
                    warn!("final Y differs from the {}-thread run", base.threads);
                    mismatches += 1;
                }
                if !averages_match(&base.y_avgs, &sample.y_avgs) {
                    warn!("Y_avgs differ from the {}-thread run", base.threads);
                    mismatches += 1;
                }
            }
        }

        if baseline.is_none() {
            baseline = Some(sample);
        }
    }

    if mismatches > 0 {
        bail!("{mismatches} result mismatches against the baseline run");
    }
    println!("\nAll runs match the baseline.");
    Ok(())
}
