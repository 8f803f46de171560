use thiserror::Error;

pub type Result<T, E = CoverageError> = std::result::Result<T, E>;

/// The error taxonomy named in the engine's design: one variant per failure
/// mode a caller needs to distinguish. Recoverable failures (parse errors,
/// truncated analysis, unsafe instrumentation) are handled locally by the
/// component that raised them and never reach a caller as an `Err` — they're
/// downgraded to a [`crate::diagnostics::Diagnostic`] instead. Only
/// [`CoverageError::InvariantViolation`] and outright I/O failures are meant
/// to propagate.
#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("invalid path: '{0}'")]
    InvalidPath(String),

    #[error("parse error at {file}:{line}:{column}: {message}")]
    ParseError {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("analysis of '{file}' truncated after {nodes_processed} nodes")]
    AnalysisTruncated { file: String, nodes_processed: u64 },

    #[error("instrumenter could not balance rewritten output for '{file}': {reason}")]
    InstrumentationUnsafe { file: String, reason: String },

    #[error("'{file}' ({size} bytes) exceeds instrumentation.max_file_size ({limit} bytes)")]
    InstrumentationTooLarge { file: String, size: u64, limit: u64 },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("io error: '{0}'")]
    IOError(#[from] std::io::Error),

    #[error("config error: '{0}'")]
    Json(#[from] serde_json::Error),
}
