use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::checker::Verdict;
use crate::history::BenchmarkSummary;
use crate::rapl::AggregateMetrics;

pub const SCHEMA_VERSION: u32 = 1;

/// Environment variables consulted, in order, for the revision under test.
const REVISION_VARS: &[&str] = &["GIT_SHA", "GITHUB_SHA"];

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub program: String,
    pub problem_id: String,
    /// RFC 3339, second precision, `Z` suffix.
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
}

impl RunMeta {
    pub fn for_program(program: &str, problem_id: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            bench_version: env!("CARGO_PKG_VERSION").to_string(),
            program: program.to_string(),
            problem_id: problem_id.to_string(),
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            git_sha: revision_from_env(),
        }
    }
}

/// First non-empty revision variable, abbreviated to 12 characters.
fn revision_from_env() -> Option<String> {
    REVISION_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|rev| !rev.trim().is_empty())
        .map(|rev| rev.trim().chars().take(12).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Measured,
    CompileFailed,
    TestsFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct IterationOutcome {
    /// Where the source came from (file name, or "original").
    pub label: String,
    pub source_sha256: String,
    pub status: OutcomeStatus,
    /// History index, set once the source has been measured.
    pub iteration: Option<usize>,
    pub compilation_error: Option<String>,
    pub verdict: Option<Verdict>,
    pub metrics: Option<AggregateMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub run: RunMeta,
    pub outcomes: Vec<IterationOutcome>,
    pub summary: Option<BenchmarkSummary>,
}

pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut s = String::with_capacity(64);
    for b in digest {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_string() {
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn run_meta_timestamp_is_rfc3339_utc() {
        let meta = RunMeta::for_program("p1_s2_t3.cpp", "p1");
        assert_eq!(meta.schema_version, SCHEMA_VERSION);
        assert_eq!(meta.problem_id, "p1");
        assert!(meta.timestamp_utc.ends_with('Z'), "{}", meta.timestamp_utc);
        let parsed = chrono::DateTime::parse_from_rfc3339(&meta.timestamp_utc).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
    }

    #[test]
    fn status_serializes_snake_case() {
        let v = serde_json::to_value(OutcomeStatus::CompileFailed).unwrap();
        assert_eq!(v, "compile_failed");
    }
}
