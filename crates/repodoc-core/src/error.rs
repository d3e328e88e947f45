//! Error taxonomy for pipeline runs.
//!
//! Every failure a stage can produce is one of the [`PipelineError`]
//! variants. The orchestrator uses [`PipelineError::is_recoverable`] to
//! decide whether a run records the error and continues with a fallback
//! value, or stops in the `FAILED` state.
//!
//! | Variant | Recoverable | Raised by |
//! |---------|-------------|-----------|
//! | `Read` | yes | loader, per skipped file |
//! | `Config` | no | invalid path, chunker or provider settings |
//! | `EmbeddingService` | yes | index store after retries are exhausted |
//! | `Generation` | yes | generation stage after retries are exhausted |
//! | `Consistency` | no | chunk references a file absent from the analysis |
//! | `Cancelled` | no | cancellation flag observed between stages |
//!
//! External calls report [`ServiceError`], which only distinguishes
//! transient failures (worth retrying) from permanent ones.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("read error: {path}: {message}")]
    Read { path: String, message: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("embedding service error: {message}")]
    EmbeddingService { message: String },

    #[error("generation error: {message}")]
    Generation { message: String },

    #[error("consistency error: {message}")]
    Consistency { message: String },

    #[error("run cancelled before {stage}")]
    Cancelled { stage: String },
}

impl PipelineError {
    pub fn read<P: Into<String>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Read {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn embedding_service<S: Into<String>>(message: S) -> Self {
        Self::EmbeddingService {
            message: message.into(),
        }
    }

    pub fn generation<S: Into<String>>(message: S) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    pub fn consistency<S: Into<String>>(message: S) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    pub fn cancelled<S: Into<String>>(stage: S) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Read { .. } => ErrorKind::ReadError,
            Self::Config { .. } => ErrorKind::ConfigError,
            Self::EmbeddingService { .. } => ErrorKind::EmbeddingServiceError,
            Self::Generation { .. } => ErrorKind::GenerationError,
            Self::Consistency { .. } => ErrorKind::ConsistencyError,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether a run may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Read { .. } | Self::EmbeddingService { .. } | Self::Generation { .. }
        )
    }
}

/// Serializable discriminant of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ReadError,
    ConfigError,
    EmbeddingServiceError,
    GenerationError,
    ConsistencyError,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ReadError => "ReadError",
            Self::ConfigError => "ConfigError",
            Self::EmbeddingServiceError => "EmbeddingServiceError",
            Self::GenerationError => "GenerationError",
            Self::ConsistencyError => "ConsistencyError",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// One entry of a run's error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Stage that raised the error, e.g. `"EMBEDDING"`.
    pub stage: String,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(stage: &str, err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            stage: stage.to_string(),
            message: err.to_string(),
        }
    }
}

/// Failure reported by an external service call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Rate limits, server errors, network failures, timeouts.
    #[error("{0}")]
    Transient(String),

    /// Client errors and malformed responses. Retrying will not help.
    #[error("{0}")]
    Permanent(String),
}

impl ServiceError {
    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self::Transient(message.into())
    }

    pub fn permanent<S: Into<String>>(message: S) -> Self {
        Self::Permanent(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
