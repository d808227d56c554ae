// src/error.rs

use std::path::PathBuf;

/// Everything that can abort a mining run.
///
/// Pruning decisions are not errors, and a failed worker job is reported in the
/// run summary instead of here, so siblings keep going.
#[derive(thiserror::Error, Debug)]
pub enum MineError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Malformed input for change '{change}': {reason}")]
    MalformedInput { change: String, reason: String },

    #[error("Malformed timeline: {0}")]
    MalformedTimeline(String),

    #[error("Malformed rule line {line}: {reason}")]
    RuleFormat { line: usize, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

impl MineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        MineError::Json {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(change: &str, reason: impl Into<String>) -> Self {
        MineError::MalformedInput {
            change: change.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MineError>;
