//! Invoking the external build tool.
//!
//! Every compile, run and measure step goes through a [`BuildTool`] with an
//! explicit working directory; nothing here changes the process's current
//! directory.

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::error::{BenchError, Result};
use crate::harness::BenchConfig;
use crate::Variant;

/// The fixed operations the build tool exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Compile(Variant),
    Run(Variant),
    Measure(Variant),
}

impl Verb {
    pub fn target(&self) -> &'static str {
        match self {
            Verb::Compile(Variant::Baseline) => "compile",
            Verb::Compile(Variant::Candidate) => "compile_optimized",
            Verb::Run(Variant::Baseline) => "run",
            Verb::Run(Variant::Candidate) => "run_optimized",
            Verb::Measure(Variant::Baseline) => "measure",
            Verb::Measure(Variant::Candidate) => "measure_optimized",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        decode(&self.stdout)
    }

    pub fn stderr_text(&self) -> String {
        decode(&self.stderr)
    }
}

pub trait BuildTool {
    /// Run `verb` in `workdir`, feeding `stdin` from a file when given and
    /// passing `vars` as `key=value` arguments.
    fn invoke(
        &self,
        verb: Verb,
        workdir: &Path,
        stdin: Option<&Path>,
        vars: &[(&str, &str)],
    ) -> Result<ToolOutput>;

    fn config(&self) -> &BenchConfig;
}

/// Drives a Makefile-based build through the configured `make` binary.
#[derive(Clone, Debug)]
pub struct MakeTool {
    config: BenchConfig,
}

impl MakeTool {
    pub fn new(config: BenchConfig) -> Self {
        Self { config }
    }
}

impl BuildTool for MakeTool {
    fn invoke(
        &self,
        verb: Verb,
        workdir: &Path,
        stdin: Option<&Path>,
        vars: &[(&str, &str)],
    ) -> Result<ToolOutput> {
        let mut cmd = Command::new(&self.config.build_program);
        cmd.arg(verb.target())
            .args(vars.iter().map(|(k, v)| format!("{k}={v}")))
            .current_dir(workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        match stdin {
            Some(path) => cmd.stdin(File::open(path)?),
            None => cmd.stdin(Stdio::null()),
        };

        debug!(make_target = verb.target(), workdir = %workdir.display(), "invoking build tool");
        let out = cmd.output().map_err(|source| BenchError::ToolLaunch {
            program: self.config.build_program.clone(),
            source,
        })?;

        Ok(ToolOutput {
            status: out.status.code(),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }

    fn config(&self) -> &BenchConfig {
        &self.config
    }
}

/// Byte-preserving decode: every byte becomes the code point of the same
/// value (Latin-1), so arbitrary program output never fails to decode.
pub fn decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Read a file with the same decoding applied to program output.
pub fn read_decoded(path: &Path) -> io::Result<String> {
    std::fs::read(path).map(|b| decode(&b))
}

/// Drop the build tool's own lines from program stdout.
pub fn filter_noise(config: &BenchConfig, stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| !config.is_noise(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the `variant` build with `input` on stdin.
///
/// Returns `None` when the program exits unsuccessfully; callers treat that
/// as "no output produced".
pub fn run_program(
    tool: &dyn BuildTool,
    workdir: &Path,
    variant: Variant,
    input: &Path,
) -> Result<Option<String>> {
    info!(variant = variant.as_str(), input = %input.display(), "running program");
    let out = tool.invoke(Verb::Run(variant), workdir, Some(input), &[])?;

    if !out.success() {
        info!(
            status = ?out.status,
            stderr = %out.stderr_text(),
            "program exited unsuccessfully"
        );
        return Ok(None);
    }

    let filtered = filter_noise(tool.config(), &out.stdout_text());
    debug!(output = %filtered, "filtered program output");
    Ok(Some(filtered))
}
