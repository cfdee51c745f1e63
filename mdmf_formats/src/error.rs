use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a level load. Line numbers refer to the
/// preprocessed buffer (comments stripped, blank lines removed).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("format error: {0}")]
    Format(String),
    #[error("structural error at line {line}: {message}")]
    Structural { line: usize, message: String },
    #[error("value error at line {line}: {message}")]
    Value { line: usize, message: String },
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("sector {sector_id} references plane {plane_id}, which is not declared in the Lines segment")]
    UnknownPlane { plane_id: i32, sector_id: i32 },
    #[error("sector {sector_id} references vertex {index} but only has {count} vertices")]
    VertexOutOfRange {
        sector_id: i32,
        index: i32,
        count: usize,
    },
}

impl LoadError {
    pub fn structural(line: usize, message: impl Into<String>) -> Self {
        LoadError::Structural {
            line,
            message: message.into(),
        }
    }

    pub fn value(line: usize, message: impl Into<String>) -> Self {
        LoadError::Value {
            line,
            message: message.into(),
        }
    }

    /// Line the error was raised on, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoadError::Structural { line, .. } | LoadError::Value { line, .. } => Some(*line),
            LoadError::Format(_) => Some(0),
            LoadError::Link(_) | LoadError::Io { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;
