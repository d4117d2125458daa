//! Per-session iteration history and the original / best / current summary.

use serde::Serialize;
use tracing::info;

use crate::error::{BenchError, Result};
use crate::source::line_count;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IterationRecord {
    #[serde(skip)]
    pub iteration: usize,
    #[serde(rename = "source_code")]
    pub source: String,
    pub avg_energy: f64,
    #[serde(rename = "avg_runtime")]
    pub avg_latency: f64,
    #[serde(rename = "num_of_lines")]
    pub line_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BenchmarkSummary {
    pub original: IterationRecord,
    pub lowest_avg_energy: IterationRecord,
    pub current: IterationRecord,
}

/// Append-only; iteration `i` is stored at position `i`.
#[derive(Clone, Debug, Default)]
pub struct IterationHistory {
    records: Vec<IterationRecord>,
}

impl IterationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index the next `record` call must use.
    pub fn next_index(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, iteration: usize) -> Option<&IterationRecord> {
        self.records.get(iteration)
    }

    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    pub fn record(
        &mut self,
        iteration: usize,
        source: &str,
        avg_energy: f64,
        avg_latency: f64,
    ) -> Result<&IterationRecord> {
        let expected = self.next_index();
        if iteration != expected {
            return Err(BenchError::NonContiguousIteration {
                expected,
                got: iteration,
            });
        }

        self.records.push(IterationRecord {
            iteration,
            source: source.to_string(),
            avg_energy,
            avg_latency,
            line_count: line_count(source),
        });
        let rec = &self.records[iteration];
        info!(
            iteration,
            avg_energy = rec.avg_energy,
            avg_runtime = rec.avg_latency,
            num_of_lines = rec.line_count,
            "recorded iteration"
        );
        Ok(rec)
    }

    pub fn summarize(&self) -> Result<BenchmarkSummary> {
        let (original, rest) = self.records.split_first().ok_or(BenchError::EmptyHistory)?;

        // Strict less-than keeps the earliest record on ties.
        let mut lowest = original;
        for rec in rest {
            if rec.avg_energy < lowest.avg_energy {
                lowest = rec;
            }
        }
        let current = rest.last().unwrap_or(original);

        Ok(BenchmarkSummary {
            original: original.clone(),
            lowest_avg_energy: lowest.clone(),
            current: current.clone(),
        })
    }
}

impl BenchmarkSummary {
    pub fn log(&self) {
        info!(
            avg_energy = self.original.avg_energy,
            avg_runtime = self.original.avg_latency,
            "original"
        );
        info!(
            iteration = self.lowest_avg_energy.iteration,
            avg_energy = self.lowest_avg_energy.avg_energy,
            avg_runtime = self.lowest_avg_energy.avg_latency,
            "lowest average energy"
        );
        info!(
            iteration = self.current.iteration,
            avg_energy = self.current.avg_energy,
            avg_runtime = self.current.avg_latency,
            "current"
        );
    }
}
