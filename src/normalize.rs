//! Whitespace-insensitive output comparison.
//!
//! Program output and expected fixture output are both reduced to their
//! non-whitespace characters before comparison, so trailing newlines,
//! indentation and column padding never cause a mismatch.

/// Unicode whitespace plus the ASCII information separators (U+001C to
/// U+001F), which fixture files treat as spacing too.
pub fn is_space(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

/// Remove every whitespace character from `text`.
pub fn normalize(text: &str) -> String {
    text.chars().filter(|c| !is_space(*c)).collect()
}

/// Concatenate `lines` and normalize the result.
pub fn normalize_lines<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for line in lines {
        out.extend(line.as_ref().chars().filter(|c| !is_space(*c)));
    }
    out
}

/// Absent output stays absent.
pub fn normalize_opt(text: Option<&str>) -> Option<String> {
    text.map(normalize)
}
