use std::time::Duration;

use thiserror::Error;

/// Collector-local failure.
///
/// Every fault a collector can hit collapses into one of these kinds.
/// The aggregator only cares that the domain failed; the kind is kept so
/// the error string in the snapshot stays diagnosable.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("{tool} not found")]
    MissingTool { tool: String },

    #[error("{command} timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("{command} exited with status {code:?}")]
    UnexpectedExit { command: String, code: Option<i32> },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unavailable(String),
}

impl CollectError {
    pub fn missing_tool<S: Into<String>>(tool: S) -> Self {
        CollectError::MissingTool { tool: tool.into() }
    }

    pub fn parse<S: Into<String>, D: Into<String>>(what: S, detail: D) -> Self {
        CollectError::Parse {
            what: what.into(),
            detail: detail.into(),
        }
    }

    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        CollectError::Unavailable(msg.into())
    }
}

/// Result type used by every collector.
pub type CollectResult<T> = std::result::Result<T, CollectError>;
