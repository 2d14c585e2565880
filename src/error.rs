//! Error types for the suffix pass.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while rewriting a file or running the pass.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Source, stylesheet or selector text could not be parsed.
    #[error("failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The suffix artifact or the pass options are not valid JSON.
    #[error("invalid json in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl TransformError {
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A selector list that does not follow CSS selector grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector at offset {offset}: {message}")]
pub struct SelectorError {
    pub offset: usize,
    pub message: String,
}

impl SelectorError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

pub type Result<T, E = TransformError> = std::result::Result<T, E>;
