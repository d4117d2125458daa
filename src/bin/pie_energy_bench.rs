use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pie_energy_bench::dataset;
use pie_energy_bench::exec::MakeTool;
use pie_energy_bench::harness::{self, BenchConfig};
use pie_energy_bench::rapl;
use pie_energy_bench::schema::{sha256_hex, IterationOutcome, OutcomeStatus, RunMeta, SessionReport};
use pie_energy_bench::session::{CompilableBenchmark, PieBenchmark};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
enum Command {
    /// Select programs from the dataset and lay out their benchmark directories.
    Setup {
        /// Number of distinct problems to set up.
        #[arg(long, short = 'n', default_value_t = 5)]
        count: usize,

        /// Dataset file; defaults to `<benchmark dir>/val.jsonl`.
        #[arg(long, value_name = "FILE")]
        dataset: Option<PathBuf>,
    },

    /// Compile and measure the original program only.
    Baseline {
        #[arg(long)]
        program: String,
    },

    /// Measure the baseline, then check and measure each candidate in order.
    Evaluate {
        #[arg(long)]
        program: String,

        /// Candidate source files (optimizer output; fences and comments are stripped).
        #[arg(short, long, value_name = "FILE", num_args = 1.., required = true, action = clap::ArgAction::Append)]
        candidate: Vec<PathBuf>,
    },

    /// Compile a candidate and run it against the fixtures without measuring.
    Check {
        #[arg(long)]
        program: String,

        #[arg(short, long, value_name = "FILE")]
        candidate: PathBuf,
    },

    /// Aggregate an existing energy log.
    ParseLog {
        /// Log to read; defaults to the configured log path.
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Write a candidate where the AST tooling expects it and print the path.
    Preprocess {
        #[arg(long)]
        program: String,

        #[arg(short, long, value_name = "FILE")]
        candidate: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "pie-energy-bench")]
#[command(about = "Correctness and energy benchmark runner for program rewrites (JSON output)")]
struct Args {
    /// Installation prefix holding `benchmark_pie/` and the runtime logs.
    #[arg(long, env = "USER_PREFIX", global = true, default_value = ".")]
    root: PathBuf,

    /// Build tool invoked with the compile/run/measure targets.
    #[arg(long, default_value = harness::DEFAULT_BUILD_PROGRAM, global = true)]
    build_tool: String,

    /// Energy log written by the sampler; defaults to `<root>/src/runtime_logs/c++.csv`.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Fixture fed to the program while measuring.
    #[arg(long, default_value = harness::DEFAULT_MEASURE_INPUT, global = true)]
    measure_input: String,

    /// Where to write the JSON report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

impl Args {
    fn config(&self) -> BenchConfig {
        let mut cfg = BenchConfig::from_root(self.root.clone());
        cfg.build_program = self.build_tool.clone();
        cfg.measure_input = self.measure_input.clone();
        if let Some(log) = &self.log_file {
            cfg.log_path = log.clone();
        }
        cfg
    }
}

fn emit<T: serde::Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => fs::write(path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn read_candidate(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading candidate {}", path.display()))
}

fn open_session(cfg: BenchConfig, program: &str) -> Result<PieBenchmark<MakeTool>> {
    PieBenchmark::new(MakeTool::new(cfg), program)
        .with_context(|| format!("opening benchmark for {program}"))
}

fn run_meta(bench: &PieBenchmark<MakeTool>) -> RunMeta {
    RunMeta::for_program(bench.program(), bench.problem_id())
}

fn baseline_outcome(bench: &mut PieBenchmark<MakeTool>) -> Result<IterationOutcome> {
    let compiled = bench.measure_baseline()?;
    let original = bench.original_code();
    Ok(IterationOutcome {
        label: "original".to_string(),
        source_sha256: sha256_hex(original),
        status: if compiled {
            OutcomeStatus::Measured
        } else {
            OutcomeStatus::CompileFailed
        },
        iteration: compiled.then_some(0),
        compilation_error: bench.compilation_error().map(str::to_string),
        verdict: None,
        metrics: bench.last_metrics().cloned(),
    })
}

fn candidate_outcome(bench: &mut PieBenchmark<MakeTool>, path: &Path) -> Result<IterationOutcome> {
    let raw = read_candidate(path)?;
    let compiled = bench.compile(&raw)?;
    let mut outcome = IterationOutcome {
        label: harness::display_name(path),
        source_sha256: sha256_hex(bench.candidate_source().unwrap_or_default()),
        status: OutcomeStatus::CompileFailed,
        iteration: None,
        compilation_error: None,
        verdict: None,
        metrics: None,
    };

    if !compiled {
        outcome.compilation_error = bench.compilation_error().map(str::to_string);
        return Ok(outcome);
    }

    let verdict = bench.run_tests()?;
    let passed = verdict.passed();
    outcome.verdict = Some(verdict);
    if !passed {
        outcome.status = OutcomeStatus::TestsFailed;
        return Ok(outcome);
    }

    bench.measure_energy()?;
    outcome.status = OutcomeStatus::Measured;
    outcome.iteration = Some(bench.history().len() - 1);
    outcome.metrics = bench.last_metrics().cloned();
    Ok(outcome)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    let cfg = args.config();
    let out = args.out.as_deref();

    match &args.cmd {
        Command::Setup {
            count,
            dataset: file,
        } => {
            let path = file.clone().unwrap_or_else(|| cfg.dataset_path());
            let programs = dataset::setup_benchmarks(&cfg, &path, *count)
                .with_context(|| format!("setting up benchmarks from {}", path.display()))?;
            emit(&programs, out)?;
        }
        Command::Baseline { program } => {
            let mut bench = open_session(cfg, program)?;
            let outcome = baseline_outcome(&mut bench)?;
            let report = SessionReport {
                run: run_meta(&bench),
                summary: bench.summary().ok(),
                outcomes: vec![outcome],
            };
            emit(&report, out)?;
        }
        Command::Evaluate { program, candidate } => {
            let mut bench = open_session(cfg, program)?;
            let mut outcomes = vec![baseline_outcome(&mut bench)?];

            if outcomes[0].status != OutcomeStatus::Measured {
                warn!("original program did not compile; skipping candidates");
            } else {
                for path in candidate {
                    info!(candidate = %path.display(), "evaluating candidate");
                    outcomes.push(candidate_outcome(&mut bench, path)?);
                }
            }

            let report = SessionReport {
                run: run_meta(&bench),
                summary: bench.summary().ok(),
                outcomes,
            };
            emit(&report, out)?;
        }
        Command::Check { program, candidate } => {
            let mut bench = open_session(cfg, program)?;
            let code = read_candidate(candidate)?;
            let compiled = bench.compile(&code)?;
            if !compiled {
                bail!(
                    "candidate failed to compile:\n{}",
                    bench.compilation_error().unwrap_or_default()
                );
            }
            emit(&bench.run_tests()?, out)?;
        }
        Command::ParseLog { file } => {
            let path = file.clone().unwrap_or_else(|| cfg.log_path.clone());
            let metrics = rapl::compute_metrics(&path)
                .with_context(|| format!("aggregating {}", path.display()))?;
            emit(&metrics, out)?;
        }
        Command::Preprocess { program, candidate } => {
            let bench = open_session(cfg, program)?;
            let code = bench.post_process(&read_candidate(candidate)?);
            let path = bench.pre_process(&code)?;
            println!("{}", path.display());
        }
    }

    Ok(())
}
