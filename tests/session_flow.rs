//! End-to-end session runs against a scripted build tool.

use pie_energy_bench::exec::{BuildTool, ToolOutput, Verb};
use pie_energy_bench::harness::BenchConfig;
use pie_energy_bench::session::{CompilableBenchmark, PieBenchmark};
use pie_energy_bench::{BenchError, Result, Variant};
use std::cell::RefCell;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const PROGRAM: &str = "p00001_s100_t200.cpp";
const ORIGINAL: &str = "#include <cstdio>\nint main() {\n  return 0;\n}\n";

/// Pretends to be `make`: compiles anything without `#error`, runs programs
/// by doubling the integer on stdin (or echoing it for a "wrong" candidate),
/// and writes queued logs when asked to measure.
struct FakeMake {
    config: BenchConfig,
    logs: RefCell<Vec<String>>,
    measure_status: i32,
    calls: RefCell<Vec<&'static str>>,
}

impl FakeMake {
    fn candidate_source(&self, workdir: &Path) -> String {
        fs::read_to_string(workdir.join(format!("optimized_{PROGRAM}"))).unwrap_or_default()
    }
}

impl BuildTool for FakeMake {
    fn invoke(
        &self,
        verb: Verb,
        workdir: &Path,
        stdin: Option<&Path>,
        vars: &[(&str, &str)],
    ) -> Result<ToolOutput> {
        self.calls.borrow_mut().push(verb.target());
        let ok = |stdout: String| ToolOutput {
            status: Some(0),
            stdout: stdout.into_bytes(),
            stderr: vec![],
        };

        match verb {
            Verb::Compile(Variant::Candidate) if self.candidate_source(workdir).contains("#error") => {
                Ok(ToolOutput {
                    status: Some(2),
                    stdout: vec![],
                    stderr: b"optimized.cpp:1: error: boom".to_vec(),
                })
            }
            Verb::Compile(_) => Ok(ok(String::new())),
            Verb::Run(variant) => {
                let input = fs::read_to_string(stdin.unwrap())?;
                let n: i64 = input.trim().parse().unwrap();
                let wrong = variant == Variant::Candidate
                    && self.candidate_source(workdir).contains("WRONG");
                let answer = if wrong { n } else { n * 2 };
                Ok(ok(format!("make[1]: Entering directory\n./prog\n  {answer}\n")))
            }
            Verb::Measure(_) => {
                assert_eq!(vars, &[("input", "input.0.txt"), ("problem_id", "p00001")]);
                let log = &self.config.log_path;
                assert_eq!(fs::read_to_string(log)?, "", "log must be cleared first");
                if self.measure_status != 0 {
                    return Ok(ToolOutput {
                        status: Some(self.measure_status),
                        stdout: vec![],
                        stderr: b"rapl: permission denied".to_vec(),
                    });
                }
                let content = self.logs.borrow_mut().remove(0);
                fs::write(log, content)?;
                Ok(ok(String::new()))
            }
        }
    }

    fn config(&self) -> &BenchConfig {
        &self.config
    }
}

/// Three valid runs, two negative-energy samples, throughput on row 5.
fn log(energy: [f64; 3]) -> String {
    format!(
        "r0,{},10,1000,64\nr1,-1,99,99,9999\nr2,{},20,2000,128\nr3,{},30,3000,32\nr4,-3,1,1,1\nthroughput,12.5\n",
        energy[0], energy[1], energy[2]
    )
}

fn runs_of(bench: &PieBenchmark<FakeMake>, target: &str) -> usize {
    bench.tool().calls.borrow().iter().filter(|t| **t == target).count()
}

fn workspace(logs: Vec<String>, measure_status: i32) -> (TempDir, PieBenchmark<FakeMake>) {
    let root = tempdir().unwrap();
    let cfg = BenchConfig::from_root(root.path());
    let tests = cfg.test_case_dir("p00001");
    fs::create_dir_all(&tests).unwrap();
    fs::create_dir_all(cfg.log_path.parent().unwrap()).unwrap();
    fs::write(&cfg.log_path, "stale,1,1,1,1\n").unwrap();
    fs::write(cfg.problem_dir("p00001").join(PROGRAM), ORIGINAL).unwrap();
    for (i, n) in [3, 21].iter().enumerate() {
        fs::write(tests.join(format!("input.{i}.txt")), format!("{n}\n")).unwrap();
        fs::write(tests.join(format!("output.{i}.txt")), format!("{}\n", n * 2)).unwrap();
    }

    let tool = FakeMake {
        config: cfg,
        logs: RefCell::new(logs),
        measure_status,
        calls: RefCell::new(vec![]),
    };
    let bench = PieBenchmark::new(tool, PROGRAM).unwrap();
    (root, bench)
}

#[test]
fn baseline_then_candidates_builds_summary() {
    let (_root, mut bench) = workspace(
        vec![log([10.0, 20.0, 30.0]), log([5.0, 5.0, 5.0]), log([8.0, 8.0, 8.0])],
        0,
    );
    assert_eq!(bench.original_code(), ORIGINAL);

    assert!(bench.measure_baseline().unwrap());
    let base = bench.last_metrics().unwrap();
    assert_eq!(base.avg_energy, 20.0);
    assert_eq!(base.max_peak_memory, 128.0);
    assert_eq!(base.throughput, 12.5);
    assert_eq!(base.discarded, 2);

    let v1 = "```cpp\nint main() { return 1; } // faster\n```";
    assert!(bench.compile(v1).unwrap());
    assert!(bench.run_tests().unwrap().passed());
    let summary = bench.measure_energy().unwrap();
    assert_eq!(summary.current.source, "\nint main() { return 1; } \n");
    assert_eq!(summary.current.avg_energy, 5.0);
    assert_eq!(summary.lowest_avg_energy.iteration, 1);

    assert!(bench.compile("int main() { return 2; }").unwrap());
    assert!(bench.run_tests().unwrap().passed());
    let summary = bench.measure_energy().unwrap();
    assert_eq!(summary.original.avg_energy, 20.0);
    assert_eq!(summary.original.source, ORIGINAL);
    assert_eq!(summary.original.line_count, 4);
    assert_eq!(summary.lowest_avg_energy.avg_energy, 5.0);
    assert_eq!(summary.current.avg_energy, 8.0);
    assert_eq!(bench.history().len(), 3);

    let written =
        fs::read_to_string(bench.problem_dir().join(format!("optimized_{PROGRAM}"))).unwrap();
    assert_eq!(written, "int main() { return 2; }");
    assert_eq!(runs_of(&bench, "measure"), 1);
    assert_eq!(runs_of(&bench, "measure_optimized"), 2);
    assert_eq!(runs_of(&bench, "run_optimized"), 4);
}

#[test]
fn history_records_exactly_the_compiled_text() {
    let (_root, mut bench) = workspace(vec![log([4.0, 4.0, 4.0]), log([2.0, 2.0, 2.0])], 0);
    assert!(bench.measure_baseline().unwrap());

    // Stripping the comment joins the backticks into a fence marker, which a
    // second sanitizing pass would also remove.
    assert!(bench.compile("``/**/`").unwrap());
    assert_eq!(bench.candidate_source(), Some("```"));
    assert!(bench.run_tests().unwrap().passed());

    let summary = bench.measure_energy().unwrap();
    let written =
        fs::read_to_string(bench.problem_dir().join(format!("optimized_{PROGRAM}"))).unwrap();
    assert_eq!(written, "```");
    assert_eq!(summary.current.source, written);
    assert_eq!(summary.current.line_count, 1);
}

#[test]
fn wrong_candidate_fails_on_first_fixture() {
    let (_root, mut bench) = workspace(vec![log([1.0, 1.0, 1.0])], 0);
    assert!(bench.measure_baseline().unwrap());

    assert!(bench.compile("int main() { /* WRONG */ return 0; }\n// WRONG").unwrap());
    // Comments are stripped before writing, so this candidate is correct.
    assert!(bench.run_tests().unwrap().passed());

    assert_eq!(runs_of(&bench, "run_optimized"), 2);

    assert!(bench.compile("const char* s = \"WRONG\";").unwrap());
    let verdict = bench.run_tests().unwrap();
    assert!(!verdict.passed());
    assert_eq!(runs_of(&bench, "run_optimized"), 3);
    assert_eq!(bench.history().len(), 1);
}

#[test]
fn compile_failure_is_kept_and_blocks_tests() {
    let (_root, mut bench) = workspace(vec![log([1.0, 1.0, 1.0])], 0);
    assert!(bench.measure_baseline().unwrap());

    assert!(!bench.compile("#error nope").unwrap());
    assert_eq!(bench.compilation_error(), Some("optimized.cpp:1: error: boom"));
    assert!(matches!(bench.run_tests(), Err(BenchError::NotCompiled(_))));
    assert!(matches!(
        bench.measure_energy(),
        Err(BenchError::NotCompiled(_))
    ));
}

#[test]
fn candidate_before_baseline_is_rejected() {
    let (_root, mut bench) = workspace(vec![], 0);
    assert!(bench.compile("int main() {}").unwrap());
    assert!(matches!(bench.measure_energy(), Err(BenchError::EmptyHistory)));
    assert!(matches!(bench.summary(), Err(BenchError::EmptyHistory)));
}

#[test]
fn failed_measurement_is_an_error() {
    let (_root, mut bench) = workspace(vec![], 3);
    match bench.measure_baseline().unwrap_err() {
        BenchError::MeasureFailed { target, status, stderr } => {
            assert_eq!(target, "measure");
            assert_eq!(status, Some(3));
            assert!(stderr.contains("permission denied"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(bench.history().is_empty());
}

#[test]
fn fixture_count_mismatch_aborts_check() {
    let (_root, mut bench) = workspace(vec![log([1.0, 1.0, 1.0])], 0);
    assert!(bench.measure_baseline().unwrap());
    let tests = bench.config().test_case_dir("p00001");
    fs::remove_file(tests.join("output.1.txt")).unwrap();

    assert!(bench.compile("int main() {}").unwrap());
    assert!(matches!(
        bench.run_tests(),
        Err(BenchError::FixtureCountMismatch { inputs: 2, outputs: 1, .. })
    ));
}

#[test]
fn ast_input_is_written_next_to_program() {
    let (_root, bench) = workspace(vec![], 0);
    let path = bench.pre_process("int x;").unwrap();
    assert_eq!(path, bench.problem_dir().join(format!("ast_{PROGRAM}")));
}
