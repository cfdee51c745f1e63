use std::fs;
use std::path::Path;

use crate::error::{LoadError, Result};

/// Line comment markers, stripped in this order.
pub const COMMENT_MARKERS: [&str; 2] = ["##", "//"];

/// Turn raw level text into the cleaned line buffer every later stage works
/// on. Lines are cleaned independently; empty results are dropped, so the
/// returned indices no longer match the source file's line numbers.
pub fn preprocess_text(text: &str) -> Vec<String> {
    text.lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Strip comments from a single line and collapse its whitespace.
pub fn clean_line(raw: &str) -> String {
    let mut line = raw;
    for marker in COMMENT_MARKERS {
        if let Some(idx) = line.find(marker) {
            line = &line[..idx];
        }
    }
    collapse_whitespace(line)
}

pub(crate) fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Read and preprocess a level file from disk.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(preprocess_text(&text))
}
