use thiserror::Error;

/// codex-wrapped error types
#[derive(Error, Debug)]
pub enum WrappedError {
    /// Failed to parse JSON/JSONL
    #[error("parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Pricing fetch or pricing file failed
    #[error("pricing error: {0}")]
    Pricing(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Summary document could not be written
    #[error("output error: {0}")]
    Output(String),
}

/// Result type alias for codex-wrapped
pub type Result<T> = std::result::Result<T, WrappedError>;
