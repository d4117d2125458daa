//! Fixture-by-fixture output equivalence.

use serde::Serialize;
use std::path::Path;
use tracing::{error, info};

use crate::error::Result;
use crate::exec::{read_decoded, run_program, BuildTool};
use crate::fixtures::Corpus;
use crate::normalize::{normalize, normalize_opt};
use crate::Variant;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Pass {
        fixtures: usize,
    },
    /// First fixture whose normalized output differed; `actual` is `None`
    /// when the program failed to run.
    Mismatch {
        fixture: String,
        expected: String,
        actual: Option<String>,
    },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass { .. })
    }
}

/// Run `variant` against every fixture in `corpus`, stopping at the first
/// mismatch.
pub fn check(
    tool: &dyn BuildTool,
    workdir: &Path,
    corpus: &Corpus,
    variant: Variant,
) -> Result<Verdict> {
    for fixture in &corpus.fixtures {
        let expected = normalize(&read_decoded(&fixture.expected)?);
        let output = run_program(tool, workdir, variant, &fixture.input)?;
        let actual = normalize_opt(output.as_deref());

        if actual.as_deref() != Some(expected.as_str()) {
            error!(
                fixture = %fixture.id,
                expected = %expected,
                actual = actual.as_deref().unwrap_or("<no output>"),
                "output mismatch"
            );
            return Ok(Verdict::Mismatch {
                fixture: fixture.id.clone(),
                expected,
                actual,
            });
        }
        info!(fixture = %fixture.id, "outputs are the same");
    }

    Ok(Verdict::Pass {
        fixtures: corpus.len(),
    })
}
