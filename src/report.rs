//! Run summaries as plain text, CSV-style lines, or JSON.

use clap::ValueEnum;
use serde::Serialize;

use crate::accumulator::AccumulatorKind;
use crate::config::SaxpyConfig;

/// Number of trailing values shown for Y and Y_avgs.
pub const TAIL: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Csv,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub config: SaxpyConfig,
    pub accumulator: AccumulatorKind,
    pub pinned: bool,
    pub exec_time_ms: f64,
    pub y_tail: Vec<f64>,
    pub y_avgs_tail: Vec<f64>,
}

impl RunReport {
    pub fn new(
        config: SaxpyConfig,
        accumulator: AccumulatorKind,
        pinned: bool,
        exec_time_ms: f64,
        y: &[f64],
        y_avgs: &[f64],
    ) -> Self {
        Self {
            config,
            accumulator,
            pinned,
            exec_time_ms,
            y_tail: tail(y),
            y_avgs_tail: tail(y_avgs),
        }
    }

    pub fn render(&self, format: OutputFormat) -> serde_json::Result<String> {
        match format {
            OutputFormat::Text => Ok(self.to_text()),
            OutputFormat::Csv => Ok(self.to_csv()),
            OutputFormat::Json => serde_json::to_string_pretty(self),
        }
    }

    fn to_text(&self) -> String {
        format!(
            "Execution time: {:.6} ms\nLast {} values of Y: {}\nLast {} values of Y_avgs: {}",
            self.exec_time_ms,
            self.y_tail.len(),
            join(&self.y_tail, ", "),
            self.y_avgs_tail.len(),
            join(&self.y_avgs_tail, ", ")
        )
    }

    fn to_csv(&self) -> String {
        let prefix = format!(
            "saxpy,rust,P={},T={},I={},seed={},acc={},pin={}",
            self.config.len,
            self.config.threads,
            self.config.max_iters,
            self.config.seed,
            self.accumulator.as_str(),
            if self.pinned { 1 } else { 0 }
        );
        [
            format!("{prefix},time,{:.6},ms", self.exec_time_ms),
            format!("{prefix},y_tail,{},value", join(&self.y_tail, ";")),
            format!("{prefix},y_avgs_tail,{},value", join(&self.y_avgs_tail, ";")),
        ]
        .join("\n")
    }
}

/// The last `TAIL` values, or all of them when there are fewer.
pub fn tail(values: &[f64]) -> Vec<f64> {
    values[values.len().saturating_sub(TAIL)..].to_vec()
}

fn join(values: &[f64], sep: &str) -> String {
    values
        .iter()
        .map(|v| format!("{v:.6}"))
        .collect::<Vec<_>>()
        .join(sep)
}
