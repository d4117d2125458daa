//! One benchmark session: a single program, its baseline measurement and the
//! candidate rewrites evaluated against it.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::{error, info};

use crate::checker::{self, Verdict};
use crate::error::{BenchError, Result};
use crate::exec::{BuildTool, Verb};
use crate::fixtures;
use crate::harness::{problem_id, timed, BenchConfig};
use crate::history::{BenchmarkSummary, IterationHistory};
use crate::rapl::{self, round3, AggregateMetrics};
use crate::source;
use crate::Variant;

/// What an optimization loop needs from a benchmark, independent of the
/// language or build system behind it.
pub trait CompilableBenchmark {
    /// Load the original program text from disk.
    fn set_original_code(&mut self) -> Result<()>;

    fn original_code(&self) -> &str;

    /// Compile and measure the original program as iteration 0. Returns
    /// `false` when it does not compile.
    fn measure_baseline(&mut self) -> Result<bool>;

    /// Sanitize, write and compile a candidate. Returns `false` when it does
    /// not compile; the compiler output is kept in `compilation_error`.
    fn compile(&mut self, code: &str) -> Result<bool>;

    fn compilation_error(&self) -> Option<&str>;

    /// Check the compiled candidate against every fixture.
    fn run_tests(&self) -> Result<Verdict>;

    /// Measure the compiled candidate, record the source that was compiled
    /// as the next iteration and return the updated summary.
    fn measure_energy(&mut self) -> Result<BenchmarkSummary>;

    fn history(&self) -> &IterationHistory;

    fn summary(&self) -> Result<BenchmarkSummary> {
        self.history().summarize()
    }

    /// Hand `code` to the AST tooling; returns the path it was written to.
    fn pre_process(&self, code: &str) -> Result<PathBuf>;

    fn post_process(&self, code: &str) -> String {
        source::post_process(code)
    }
}

/// A C++ program from the PIE corpus, built through its generated Makefile
/// in `<benchmark_dir>/<problem_id>/`.
pub struct PieBenchmark<T: BuildTool> {
    tool: T,
    program: String,
    problem_id: String,
    original_code: String,
    compilation_error: Option<String>,
    compiled: Option<Variant>,
    /// Sanitized text of the last candidate written for compilation.
    candidate_source: Option<String>,
    history: IterationHistory,
    last_metrics: Option<AggregateMetrics>,
}

impl<T: BuildTool> PieBenchmark<T> {
    /// `program` is the source file name, e.g. `p02725_s123_t456.cpp`.
    pub fn new(tool: T, program: &str) -> Result<Self> {
        let problem_id = problem_id(program)?.to_string();
        let mut bench = Self {
            tool,
            program: program.to_string(),
            problem_id,
            original_code: String::new(),
            compilation_error: None,
            compiled: None,
            candidate_source: None,
            history: IterationHistory::new(),
            last_metrics: None,
        };
        bench.set_original_code()?;
        Ok(bench)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn problem_id(&self) -> &str {
        &self.problem_id
    }

    pub fn config(&self) -> &BenchConfig {
        self.tool.config()
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn problem_dir(&self) -> PathBuf {
        self.config().problem_dir(&self.problem_id)
    }

    pub fn candidate_source(&self) -> Option<&str> {
        self.candidate_source.as_deref()
    }

    /// Full metrics of the most recent measurement.
    pub fn last_metrics(&self) -> Option<&AggregateMetrics> {
        self.last_metrics.as_ref()
    }

    fn compile_variant(&mut self, variant: Variant) -> Result<bool> {
        let workdir = self.problem_dir();
        let out = timed(|| self.tool.invoke(Verb::Compile(variant), &workdir, None, &[]));
        let ms = out.millis();
        let out = out.value?;

        if out.success() {
            info!(variant = variant.as_str(), elapsed_ms = ms, "compiled successfully");
            self.compilation_error = None;
            self.compiled = Some(variant);
            Ok(true)
        } else {
            let stderr = out.stderr_text();
            let message = if stderr.trim().is_empty() {
                out.stdout_text()
            } else {
                stderr
            };
            error!(variant = variant.as_str(), error = %message, "compile failed");
            self.compilation_error = Some(message);
            if self.compiled == Some(variant) {
                self.compiled = None;
            }
            Ok(false)
        }
    }

    fn clear_log(&self) -> Result<()> {
        let log = &self.config().log_path;
        if log.exists() {
            info!(log = %log.display(), "clearing energy log");
            OpenOptions::new().write(true).truncate(true).open(log)?;
        }
        Ok(())
    }

    /// Run the sampler for `variant` against a freshly cleared log and
    /// aggregate what it wrote.
    pub fn sample_energy(&self, variant: Variant) -> Result<AggregateMetrics> {
        self.clear_log()?;

        let cfg = self.config();
        let workdir = self.problem_dir();
        let verb = Verb::Measure(variant);
        let vars = [
            ("input", cfg.measure_input.as_str()),
            ("problem_id", self.problem_id.as_str()),
        ];
        let out = timed(|| self.tool.invoke(verb, &workdir, None, &vars));
        let ms = out.millis();
        let out = out.value?;

        if !out.success() {
            let stderr = out.stderr_text();
            error!(target_name = verb.target(), status = ?out.status, %stderr, "measurement failed");
            return Err(BenchError::MeasureFailed {
                target: verb.target(),
                status: out.status,
                stderr,
            });
        }
        info!(target_name = verb.target(), elapsed_ms = ms, "measurement finished");

        rapl::compute_metrics(&cfg.log_path)
    }

    /// Measure iteration `index` and append it to the history. Iteration 0
    /// is always the baseline.
    fn measure(&mut self, index: usize, code: &str) -> Result<AggregateMetrics> {
        let variant = if index == 0 {
            Variant::Baseline
        } else {
            Variant::Candidate
        };
        let metrics = self.sample_energy(variant)?;
        self.history.record(
            index,
            code,
            round3(metrics.avg_energy),
            round3(metrics.avg_latency),
        )?;
        self.last_metrics = Some(metrics.clone());
        Ok(metrics)
    }
}

impl<T: BuildTool> CompilableBenchmark for PieBenchmark<T> {
    fn set_original_code(&mut self) -> Result<()> {
        let path = self.problem_dir().join(&self.program);
        self.original_code = fs::read_to_string(&path)?;
        Ok(())
    }

    fn original_code(&self) -> &str {
        &self.original_code
    }

    fn measure_baseline(&mut self) -> Result<bool> {
        info!(program = %self.program, "benchmarking original code");
        if !self.compile_variant(Variant::Baseline)? {
            return Ok(false);
        }
        let code = self.original_code.clone();
        self.measure(0, &code)?;
        Ok(true)
    }

    fn compile(&mut self, code: &str) -> Result<bool> {
        let path = self.problem_dir().join(format!("optimized_{}", self.program));
        info!(path = %path.display(), "writing candidate");
        let sanitized = self.post_process(code);
        fs::write(&path, &sanitized)?;
        self.candidate_source = Some(sanitized);
        self.compile_variant(Variant::Candidate)
    }

    fn compilation_error(&self) -> Option<&str> {
        self.compilation_error.as_deref()
    }

    fn run_tests(&self) -> Result<Verdict> {
        if self.compiled != Some(Variant::Candidate) {
            return Err(BenchError::NotCompiled(Variant::Candidate.as_str()));
        }
        let corpus = fixtures::discover(&self.config().test_case_dir(&self.problem_id))?;
        info!(fixtures = corpus.len(), "running correctness check");
        checker::check(&self.tool, &self.problem_dir(), &corpus, Variant::Candidate)
    }

    fn measure_energy(&mut self) -> Result<BenchmarkSummary> {
        if self.history.is_empty() {
            return Err(BenchError::EmptyHistory);
        }
        let code = match (&self.compiled, &self.candidate_source) {
            (Some(Variant::Candidate), Some(code)) => code.clone(),
            _ => return Err(BenchError::NotCompiled(Variant::Candidate.as_str())),
        };
        let index = self.history.next_index();
        info!(iteration = index, "benchmarking optimized code");
        self.measure(index, &code)?;

        let summary = self.history.summarize()?;
        summary.log();
        Ok(summary)
    }

    fn history(&self) -> &IterationHistory {
        &self.history
    }

    fn pre_process(&self, code: &str) -> Result<PathBuf> {
        source::write_ast_input(&self.problem_dir(), &self.program, code)
    }
}
