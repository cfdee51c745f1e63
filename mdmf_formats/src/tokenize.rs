use std::collections::BTreeMap;

pub const OPEN_AUTOFIELD: &str = "{:";
pub const CLOSE_AUTOFIELD: &str = ":}";

/// Single-character punctuation that always stands as its own token.
pub const DELIMITERS: [char; 10] = [',', '{', '}', '[', ']', '<', '>', ':', '%', '$'];

// Private-use code points stand in for the compound delimiters while the
// single-character pass runs, so `{:` is not split into `{` and `:`.
const OPEN_PLACEHOLDER: char = '\u{E000}';
const CLOSE_PLACEHOLDER: char = '\u{E001}';

/// `#define` table for a single load. Filled while the Defines segment is
/// consumed and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    entries: BTreeMap<String, String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a macro. Returns `false` and leaves the table untouched when
    /// the name is already defined.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return false;
        }
        self.entries.insert(name, value.into());
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Pad every delimiter with spaces so a whitespace split yields one token
/// per delimiter.
pub fn delimit(line: &str) -> String {
    let protected = line
        .replace(OPEN_AUTOFIELD, &OPEN_PLACEHOLDER.to_string())
        .replace(CLOSE_AUTOFIELD, &CLOSE_PLACEHOLDER.to_string());

    let mut out = String::with_capacity(protected.len() * 2);
    for ch in protected.chars() {
        match ch {
            OPEN_PLACEHOLDER => {
                out.push(' ');
                out.push_str(OPEN_AUTOFIELD);
                out.push(' ');
            }
            CLOSE_PLACEHOLDER => {
                out.push(' ');
                out.push_str(CLOSE_AUTOFIELD);
                out.push(' ');
            }
            ch if DELIMITERS.contains(&ch) => {
                out.push(' ');
                out.push(ch);
                out.push(' ');
            }
            ch => out.push(ch),
        }
    }
    out
}

/// Tokenize a cleaned line, expanding macros once.
///
/// Substitution is whole-token and single-pass: replacement text is not
/// itself searched for macro names. The result is delimited a second time so
/// punctuation carried in by a macro body becomes separate tokens.
pub fn preprocess_line(line: &str, macros: &MacroTable) -> Vec<String> {
    let padded = format!(" {} ", delimit(line));
    let substituted: Vec<&str> = padded
        .split_whitespace()
        .map(|token| macros.get(token).unwrap_or(token))
        .collect();
    delimit(&substituted.join(" "))
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Re-join `$` `N` token pairs into the single `$N` argument reference the
/// script engine substitutes at run time.
pub fn fuse_argument_refs(tokens: Vec<String>) -> Vec<String> {
    let mut fused = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token == "$" {
            if let Some(next) = iter.peek() {
                if !next.is_empty() && next.chars().all(|ch| ch.is_ascii_digit()) {
                    let index = iter.next().unwrap_or_default();
                    fused.push(format!("${index}"));
                    continue;
                }
            }
        }
        fused.push(token);
    }
    fused
}
