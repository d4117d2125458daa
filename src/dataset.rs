//! PIE dataset selection and per-problem corpus setup.
//!
//! The dataset is a JSON-lines file of slow/fast solution pairs. Each
//! selected problem gets its own directory under the benchmark dir:
//!
//! ```text
//! <benchmark_dir>/<problem_id>/
//!   <problem_id>_<src_id>_t<tgt>.cpp   original (slow) program
//!   test_cases/input.<N>.txt           copied from merged_test_cases/
//!   test_cases/output.<N>.txt
//!   Makefile                           rendered from makefile_template.mak
//! ```

use serde::Deserialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{BenchError, Result};
use crate::harness::BenchConfig;

/// One dataset row; keys other than these are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramPair {
    pub problem_id: String,
    pub src_id: String,
    pub tgt_id: String,
    pub src_code: String,
}

impl ProgramPair {
    /// `<problem_id>_<src_id>_t<tgt_id minus its leading letter>.cpp`.
    pub fn program_name(&self) -> String {
        let tgt: String = self.tgt_id.chars().skip(1).collect();
        format!("{}_{}_t{}.cpp", self.problem_id, self.src_id, tgt)
    }

    /// Source with blank-line runs collapsed once.
    pub fn source(&self) -> String {
        self.src_code.replace("\n\n", "\n")
    }
}

/// First `count` rows of the dataset with distinct problem ids.
pub fn select_programs(path: &Path, count: usize) -> Result<Vec<ProgramPair>> {
    let reader = BufReader::new(File::open(path)?);
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(count);

    for (idx, line) in reader.lines().enumerate() {
        if out.len() >= count {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let pair: ProgramPair = serde_json::from_str(&line)
            .map_err(|source| BenchError::Dataset { line: idx + 1, source })?;
        if seen.insert(pair.problem_id.clone()) {
            debug!(problem_id = %pair.problem_id, "selected program");
            out.push(pair);
        }
    }

    info!(selected = out.len(), requested = count, "selected dataset programs");
    Ok(out)
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(std::io::Error::other)?;
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Substitute `${FILE_NAME}` and `${PROBLEM_ID}` in the Makefile template.
pub fn render_makefile(template: &str, program: &str, problem_id: &str) -> String {
    let stem = program.split('.').next().unwrap_or(program);
    template
        .replace("${FILE_NAME}", stem)
        .replace("${PROBLEM_ID}", problem_id)
}

/// Lay out one program's directory. Existing test cases are left alone.
pub fn setup_program(config: &BenchConfig, pair: &ProgramPair) -> Result<PathBuf> {
    let program = pair.program_name();
    let dir = config.problem_dir(&pair.problem_id);
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(&program), pair.source())?;

    let tests = config.test_case_dir(&pair.problem_id);
    if !tests.exists() {
        copy_tree(&config.merged_test_cases(&pair.problem_id), &tests)?;
    }

    let template = fs::read_to_string(config.makefile_template())?;
    fs::write(
        dir.join("Makefile"),
        render_makefile(&template, &program, &pair.problem_id),
    )?;

    info!(program = %program, dir = %dir.display(), "benchmark directory ready");
    Ok(dir)
}

/// Select `count` programs from `dataset` and set each up. Returns the
/// program file names.
pub fn setup_benchmarks(config: &BenchConfig, dataset: &Path, count: usize) -> Result<Vec<String>> {
    let pairs = select_programs(dataset, count)?;
    pairs
        .iter()
        .map(|pair| setup_program(config, pair).map(|_| pair.program_name()))
        .collect()
}
