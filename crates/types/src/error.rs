// crates/types/src/error.rs
use thiserror::Error;

/// Errors that can occur when decoding one snapshot payload from the stream.
#[derive(Debug, Error)]
pub enum SnapshotParseError {
    #[error("Malformed JSON at line {line}, column {column}: {message}")]
    MalformedJson {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Snapshot does not match the expected schema: {message}")]
    InvalidSnapshot { message: String },

    #[error("Empty snapshot payload")]
    Empty,
}

impl From<serde_json::Error> for SnapshotParseError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match err.classify() {
            Category::Data => Self::InvalidSnapshot {
                message: err.to_string(),
            },
            Category::Io | Category::Syntax | Category::Eof => Self::MalformedJson {
                line: err.line(),
                column: err.column(),
                message: err.to_string(),
            },
        }
    }
}
