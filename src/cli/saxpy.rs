// Iterative SAXPY over a seeded vector, split across a fixed worker pool.
//
// Usage:
//   saxpy [-p <vector size>] [-s <seed>] [-n <threads>] [-i <max iterations>]
//         [--accumulator coarse|slot|atomic] [--pin] [--format text|csv|json]
//
// RUST_LOG=debug dumps X, Y, a and the final Y.

use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use log::info;

use saxpy_threads::config::{DEFAULT_LEN, DEFAULT_MAX_ITERS, DEFAULT_SEED, DEFAULT_THREADS};
use saxpy_threads::{
    AccumulatorKind, Engine, EngineOptions, OutputFormat, RunReport, SaxpyConfig, SaxpyContext,
};

#[derive(Debug, Parser)]
#[command(name = "saxpy", about = "Iterative parallel SAXPY")]
struct Cli {
    /// Vector size
    #[arg(short = 'p', long = "len", default_value_t = DEFAULT_LEN)]
    len: usize,

    /// Seed for X, Y and a
    #[arg(short = 's', long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Number of worker threads
    #[arg(short = 'n', long, default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// Number of rounds
    #[arg(short = 'i', long = "iters", default_value_t = DEFAULT_MAX_ITERS)]
    max_iters: usize,

    /// How workers combine their per-round partial averages
    #[arg(long, value_enum, default_value_t = AccumulatorKind::Coarse)]
    accumulator: AccumulatorKind,

    /// Pin each worker to its own core
    #[arg(long)]
    pin: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = SaxpyConfig::new(cli.len, cli.seed, cli.threads, cli.max_iters);
    if cli.format == OutputFormat::Text {
        println!(
            "p = {}, seed = {}, n_threads = {}, max_iters = {}",
            config.len, config.seed, config.threads, config.max_iters
        );
    }

    let mut ctx = SaxpyContext::seeded(config).context("invalid configuration")?;
    let engine = Engine::new(
        EngineOptions::new(config.threads)
            .accumulator(cli.accumulator)
            .pin_threads(cli.pin),
    )
    .context("failed to start workers")?;

    let start = Instant::now();
    ctx.run_on(&engine).context("run failed")?;
    let exec_time_ms = start.elapsed().as_secs_f64() * 1000.0;
    info!("run finished in {exec_time_ms:.3} ms");

    let report = RunReport::new(
        config,
        cli.accumulator,
        cli.pin,
        exec_time_ms,
        ctx.y(),
        ctx.y_avgs(),
    );
    println!("{}", report.render(cli.format)?);
    Ok(())
}
