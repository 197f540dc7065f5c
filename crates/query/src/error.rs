//! Engine error taxonomy.
//!
//! Every failure a caller can observe is an `EngineError`. All variants are
//! recoverable by the caller; the engine never retries on its own.

use crate::planner::ShapeFingerprint;
use thiserror::Error;

/// Worker (scheduler shard) index.
pub type WorkerId = usize;

/// Result alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The offset key cannot resume this plan. Never partially applied.
    #[error("invalid offset key: {0}")]
    InvalidOffsetKey(#[from] OffsetKeyError),

    /// `advance()` after exhaustion or after `dispose()`.
    #[error("enumerator is exhausted or disposed")]
    InvalidState,

    /// `current_row()` without a preceding successful `advance()`.
    #[error("enumerator is not positioned on a row")]
    InvalidCursorState,

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("result type mismatch: requested {expected}, query produces {actual}")]
    ResultTypeMismatch { expected: String, actual: String },

    /// The snapshot the enumerator was bound to has ended.
    #[error("transaction bound to the enumerator has ended")]
    TransactionEnded,

    #[error("unknown worker {worker}; engine runs {workers} workers")]
    UnknownWorker { worker: WorkerId, workers: usize },

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Failure reported by the query compiler collaborator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("compile error: {message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by a row source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("store error: {0}")]
    Store(resumedb_core::Error),

    #[error("{0}")]
    Other(String),
}

impl From<resumedb_core::Error> for SourceError {
    fn from(err: resumedb_core::Error) -> Self {
        SourceError::Store(err)
    }
}

impl From<resumedb_core::Error> for EngineError {
    fn from(err: resumedb_core::Error) -> Self {
        EngineError::Source(SourceError::Store(err))
    }
}

/// Why an offset key was rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OffsetKeyError {
    #[error("offset key is empty")]
    Empty,

    #[error("offset key is {len} bytes (max {max})")]
    TooLarge { len: usize, max: usize },

    #[error("offset key is truncated")]
    Truncated,

    #[error("unsupported offset key format version {0}")]
    UnsupportedVersion(u8),

    #[error("plan shape changed: key was captured from {key}, plan is {plan}")]
    FingerprintMismatch {
        key: ShapeFingerprint,
        plan: ShapeFingerprint,
    },

    #[error("offset key holds {key} node states, plan has {plan} nodes")]
    NodeCountMismatch { key: u64, plan: usize },

    #[error("node {position}: expected {expected} state, found tag {found}")]
    NodeKindMismatch {
        position: usize,
        expected: &'static str,
        found: u8,
    },

    #[error("unknown value tag {0}")]
    UnknownValueTag(u8),

    #[error("malformed varint")]
    MalformedVarint,

    #[error("string value is not valid utf-8")]
    InvalidUtf8,

    #[error("malformed {0} field")]
    MalformedField(&'static str),

    #[error("{0} trailing bytes after the last node state")]
    TrailingBytes(usize),

    #[error("offset key token: {0}")]
    Token(#[from] crate::offset_key::TokenDecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_key_errors_surface_as_one_condition() {
        let err: EngineError = OffsetKeyError::Truncated.into();
        assert!(matches!(err, EngineError::InvalidOffsetKey(_)));
        assert!(err.to_string().starts_with("invalid offset key"));
    }

    #[test]
    fn test_compile_error_is_transparent() {
        let err: EngineError = CompileError::new("unexpected token").into();
        assert_eq!(err.to_string(), "compile error: unexpected token");
    }

    #[test]
    fn test_store_error_converts() {
        let err: EngineError = resumedb_core::Error::table_not_found("Account").into();
        assert!(matches!(err, EngineError::Source(SourceError::Store(_))));
        assert!(err.to_string().contains("Account"));
    }
}
