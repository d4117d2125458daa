use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("failed to launch build tool `{program}`: {source}")]
    ToolLaunch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("fixture count mismatch in {}: {inputs} input files, {outputs} output files", dir.display())]
    FixtureCountMismatch {
        dir: PathBuf,
        inputs: usize,
        outputs: usize,
    },

    #[error("fixture {} has no matching output; sorted pairing gave {}", input.display(), expected.display())]
    FixtureIdMismatch { input: PathBuf, expected: PathBuf },

    #[error("energy log {} is missing", path.display())]
    MissingLog { path: PathBuf },

    #[error("energy log {} has no valid samples ({discarded} discarded)", path.display())]
    NoValidSamples { path: PathBuf, discarded: usize },

    #[error("malformed energy log line {line}: {reason}")]
    MalformedLog { line: usize, reason: String },

    #[error("measurement target `{target}` failed (status {status:?}): {stderr}")]
    MeasureFailed {
        target: &'static str,
        status: Option<i32>,
        stderr: String,
    },

    #[error("iteration {got} recorded out of order; expected {expected}")]
    NonContiguousIteration { expected: usize, got: usize },

    #[error("no iterations recorded; measure the baseline first")]
    EmptyHistory,

    #[error("no successfully compiled {0} build")]
    NotCompiled(&'static str),

    #[error("invalid program name `{0}`")]
    InvalidProgram(String),

    #[error("dataset line {line}: {source}")]
    Dataset {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
