//! Energy log parsing.
//!
//! The sampler appends one header-less CSV row per measured run:
//!
//! ```text
//! name,energy,latency,cpu_cycles,peak_memory
//! ```
//!
//! except for the row at index 5, which carries the throughput of the whole
//! measurement in column 1. The layout is positional; blank lines are
//! skipped and do not count towards the row index.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{BenchError, Result};

/// Index of the row holding the throughput scalar.
pub const THROUGHPUT_ROW: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct RunLogRow {
    pub name: String,
    pub energy: f64,
    pub latency: f64,
    pub cpu_cycles: f64,
    pub peak_memory: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnergyLog {
    pub rows: Vec<RunLogRow>,
    pub throughput: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub avg_energy: f64,
    pub avg_latency: f64,
    pub avg_cpu_cycles: f64,
    pub max_peak_memory: f64,
    pub throughput: f64,
    /// Rows that contributed to the averages.
    pub samples: usize,
    /// Rows dropped for negative energy.
    pub discarded: usize,
}

fn field(cols: &[&str], idx: usize, line: usize, what: &str) -> Result<f64> {
    let raw = cols.get(idx).ok_or_else(|| BenchError::MalformedLog {
        line,
        reason: format!("missing {what} column"),
    })?;
    raw.trim().parse::<f64>().map_err(|e| BenchError::MalformedLog {
        line,
        reason: format!("{what} `{}`: {e}", raw.trim()),
    })
}

pub fn parse_log(content: &str) -> Result<EnergyLog> {
    let mut log = EnergyLog::default();
    let lines = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    for (row, (lineno, text)) in lines.enumerate() {
        let line = lineno + 1;
        let cols: Vec<&str> = text.split(',').collect();
        if row == THROUGHPUT_ROW {
            log.throughput = field(&cols, 1, line, "throughput")?;
            continue;
        }
        log.rows.push(RunLogRow {
            name: cols[0].trim().to_string(),
            energy: field(&cols, 1, line, "energy")?,
            latency: field(&cols, 2, line, "latency")?,
            cpu_cycles: field(&cols, 3, line, "cpu_cycles")?,
            peak_memory: field(&cols, 4, line, "peak_memory")?,
        });
    }

    Ok(log)
}

pub fn read_log(path: &Path) -> Result<EnergyLog> {
    match fs::read_to_string(path) {
        Ok(content) => parse_log(&content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BenchError::MissingLog {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

impl EnergyLog {
    /// Average the rows with non-negative energy. `source` names the log in
    /// errors.
    pub fn aggregate(&self, source: &Path) -> Result<AggregateMetrics> {
        let mut energy = 0.0;
        let mut latency = 0.0;
        let mut cycles = 0.0;
        let mut peak: f64 = 0.0;
        let mut samples = 0usize;
        let mut discarded = 0usize;

        for row in &self.rows {
            // Negative readings come from failed counter reads.
            if row.energy < 0.0 {
                warn!(run = %row.name, energy = row.energy, "discarding negative energy sample");
                discarded += 1;
                continue;
            }
            energy += row.energy;
            latency += row.latency;
            cycles += row.cpu_cycles;
            peak = peak.max(row.peak_memory);
            samples += 1;
        }

        if samples == 0 {
            return Err(BenchError::NoValidSamples {
                path: source.to_path_buf(),
                discarded,
            });
        }

        let n = samples as f64;
        let metrics = AggregateMetrics {
            avg_energy: energy / n,
            avg_latency: latency / n,
            avg_cpu_cycles: cycles / n,
            max_peak_memory: peak,
            throughput: self.throughput,
            samples,
            discarded,
        };
        debug!(?metrics, "aggregated energy log");
        Ok(metrics)
    }
}

/// Read and aggregate the log at `path`.
pub fn compute_metrics(path: &Path) -> Result<AggregateMetrics> {
    read_log(path)?.aggregate(path)
}

/// Round to three decimals, the precision kept in the iteration history.
pub fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
