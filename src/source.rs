//! Candidate source ingestion.

use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::Result;

static COMMENTS: OnceLock<Regex> = OnceLock::new();

fn comments() -> &'static Regex {
    // Line comments run to end of line; block comments may span lines.
    COMMENTS.get_or_init(|| {
        Regex::new(r"(?ms)//.*?$|/\*.*?\*/").expect("built-in comment regex must compile")
    })
}

/// Strip code fence markers and all C/C++ comments from optimizer output so
/// it can be handed to the compiler.
pub fn post_process(raw: &str) -> String {
    let unfenced = raw.replace("```cpp", "").replace("```", "");
    comments().replace_all(&unfenced, "").into_owned()
}

/// Number of lines as reported in the iteration history.
pub fn line_count(code: &str) -> usize {
    code.lines().count()
}

/// Write `code` next to the program as `ast_<program>` for the external AST
/// tool and return the written path.
pub fn write_ast_input(problem_dir: &Path, program: &str, code: &str) -> Result<PathBuf> {
    let path = problem_dir.join(format!("ast_{program}"));
    fs::write(&path, code)?;
    Ok(path)
}
