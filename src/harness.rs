use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{BenchError, Result};

pub const DEFAULT_BENCHMARK_DIR: &str = "benchmark_pie";
pub const DEFAULT_LOG_PATH: &str = "src/runtime_logs/c++.csv";
pub const DEFAULT_BUILD_PROGRAM: &str = "make";
pub const DEFAULT_MEASURE_INPUT: &str = "input.0.txt";

/// Lines the build tool adds to program stdout: sub-make announcements and
/// the echoed binary invocation.
pub const DEFAULT_NOISE_PREFIXES: &[&str] = &["make[", "./"];

#[derive(Clone, Debug)]
pub struct BenchConfig {
    /// Installation prefix every other path hangs off.
    pub root: PathBuf,
    /// Directory under `root` holding one sub-directory per problem.
    pub benchmark_dir: PathBuf,
    /// Energy log written by the sampler, shared by all measurements.
    pub log_path: PathBuf,
    pub build_program: String,
    /// Fixture fed to the program while it is being measured.
    pub measure_input: String,
    pub noise_prefixes: Vec<String>,
}

impl BenchConfig {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            benchmark_dir: root.join(DEFAULT_BENCHMARK_DIR),
            log_path: root.join(DEFAULT_LOG_PATH),
            build_program: DEFAULT_BUILD_PROGRAM.to_string(),
            measure_input: DEFAULT_MEASURE_INPUT.to_string(),
            noise_prefixes: DEFAULT_NOISE_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            root,
        }
    }

    pub fn problem_dir(&self, problem_id: &str) -> PathBuf {
        self.benchmark_dir.join(problem_id)
    }

    pub fn test_case_dir(&self, problem_id: &str) -> PathBuf {
        self.problem_dir(problem_id).join("test_cases")
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.benchmark_dir.join("val.jsonl")
    }

    pub fn merged_test_cases(&self, problem_id: &str) -> PathBuf {
        self.benchmark_dir.join("merged_test_cases").join(problem_id)
    }

    pub fn makefile_template(&self) -> PathBuf {
        self.benchmark_dir.join("makefile_template.mak")
    }

    pub fn is_noise(&self, line: &str) -> bool {
        self.noise_prefixes.iter().any(|p| line.starts_with(p.as_str()))
    }
}

/// Problem id of a program file name: everything before the first `_`.
pub fn problem_id(program: &str) -> Result<&str> {
    match program.split_once('_') {
        Some((id, _)) if !id.is_empty() => Ok(id),
        _ => Err(BenchError::InvalidProgram(program.to_string())),
    }
}

/// File name of `path` as a `String`, or the whole path when it has none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Clone, Debug)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn millis(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// Run `f` once and record its wall-clock duration.
pub fn timed<T>(f: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = f();
    Timed {
        value,
        elapsed: start.elapsed(),
    }
}
