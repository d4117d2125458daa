//! Test fixture corpus discovery.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{BenchError, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestFixture {
    /// The `<N>` in `input.<N>.txt`.
    pub id: String,
    pub input: PathBuf,
    pub expected: PathBuf,
}

#[derive(Clone, Debug, Default)]
pub struct Corpus {
    pub dir: PathBuf,
    pub fixtures: Vec<TestFixture>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

/// `<N>` when `name` is `<prefix>.<N>.txt`.
fn fixture_id<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    name.strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_suffix(".txt")
}

fn collect(dir: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(|n| fixture_id(n, prefix)) {
            out.push((id.to_string(), entry.path().to_path_buf()));
        }
    }
    out.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(out)
}

/// Find `input.<N>.txt` / `output.<N>.txt` pairs under `dir`.
///
/// Both lists are sorted lexicographically and paired by position. Unequal
/// counts, or a pair whose ids differ, are a setup error.
pub fn discover(dir: &Path) -> Result<Corpus> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("fixture directory {} does not exist", dir.display()),
        )
        .into());
    }

    let inputs = collect(dir, "input")?;
    let outputs = collect(dir, "output")?;

    if inputs.len() != outputs.len() {
        return Err(BenchError::FixtureCountMismatch {
            dir: dir.to_path_buf(),
            inputs: inputs.len(),
            outputs: outputs.len(),
        });
    }

    let mut fixtures = Vec::with_capacity(inputs.len());
    for ((id, input), (out_id, expected)) in inputs.into_iter().zip(outputs) {
        if id != out_id {
            return Err(BenchError::FixtureIdMismatch { input, expected });
        }
        fixtures.push(TestFixture {
            id,
            input,
            expected,
        });
    }

    Ok(Corpus {
        dir: dir.to_path_buf(),
        fixtures,
    })
}
