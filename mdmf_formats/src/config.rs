/// Number of import passes allowed before a load is rejected.
pub const DEFAULT_MAX_IMPORT_DEPTH: usize = 32;

/// Whether structural slips (trailing tokens, missing terminators, stray
/// directives in `Defines`) abort the load or are skipped with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    #[default]
    Strict,
    Lenient,
}

impl ParseMode {
    pub fn is_strict(self) -> bool {
        matches!(self, ParseMode::Strict)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    pub mode: ParseMode,
    pub max_import_depth: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            mode: ParseMode::Strict,
            max_import_depth: DEFAULT_MAX_IMPORT_DEPTH,
        }
    }
}

impl LoaderConfig {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn lenient() -> Self {
        Self {
            mode: ParseMode::Lenient,
            ..Self::default()
        }
    }
}
