//! Error types module
//!
//! All failures of the upload processing pipeline are unified under [`PipelineError`].
//! Every variant belongs to exactly one [`FailureKind`], which drives how callers
//! react: validation and state conflicts are expected and never retried, business
//! rejections and infrastructure failures drive a claimed upload to FAILED, and
//! consistency violations are surfaced loudly because the store is in a state the
//! protocol assumed impossible.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures and lost claim races
    Debug,
    /// Warning level - for business rejections of the input
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Coarse classification of a failure, kept distinct in logs even where two kinds
/// lead to the same persisted outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected before any I/O (blank id, blank persona name).
    Validation,
    /// A guard on the upload's current state did not hold.
    StateConflict,
    /// The input was understood and refused (e.g. not a resume).
    BusinessRejection,
    /// An external collaborator or the database failed.
    Infrastructure,
    /// The store contradicted the protocol (wrong affected row count, lost update).
    Consistency,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::StateConflict => "state_conflict",
            FailureKind::BusinessRejection => "business_rejection",
            FailureKind::Infrastructure => "infrastructure",
            FailureKind::Consistency => "consistency",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata describing how an error should be reported and handled.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "STATE_CONFLICT")
    fn error_code(&self) -> &'static str;

    /// Failure classification
    fn failure_kind(&self) -> FailureKind;

    /// Whether a later attempt of the same operation could succeed
    fn is_recoverable(&self) -> bool;

    /// Whether this must be surfaced as an alerting-grade condition
    fn is_fatal(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("incorrect processing state: {upload_id}")]
    StateConflict { upload_id: String },

    #[error("upload {upload_id} is already completed")]
    UploadTerminal { upload_id: String },

    #[error("unauthorized update of upload {upload_id} attempted")]
    Unauthorized { upload_id: String },

    #[error("Invalid persona: {0}")]
    InvalidPersona(String),

    #[error("needs a valid resume to parse")]
    NotAResume,

    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Object store error: {0}")]
    ObjectStore(String),

    #[error("Text extraction error: {0}")]
    Extraction(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(feature = "sqlx")]
impl From<SqlxError> for PipelineError {
    fn from(err: SqlxError) -> Self {
        PipelineError::Database(err)
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Internal {
            message: format!("JSON error: {}", err),
            source: err.into(),
        }
    }
}

/// Static metadata for each variant: (error_code, kind, recoverable, fatal, log_level).
fn pipeline_error_static_metadata(
    err: &PipelineError,
) -> (&'static str, FailureKind, bool, bool, LogLevel) {
    match err {
        PipelineError::Validation(_) => (
            "VALIDATION_ERROR",
            FailureKind::Validation,
            false,
            false,
            LogLevel::Debug,
        ),
        PipelineError::NotFound(_) => (
            "NOT_FOUND",
            FailureKind::Validation,
            false,
            false,
            LogLevel::Debug,
        ),
        PipelineError::StateConflict { .. } => (
            "STATE_CONFLICT",
            FailureKind::StateConflict,
            false,
            false,
            LogLevel::Debug,
        ),
        PipelineError::UploadTerminal { .. } => (
            "UPLOAD_TERMINAL",
            FailureKind::StateConflict,
            false,
            false,
            LogLevel::Debug,
        ),
        PipelineError::Unauthorized { .. } => (
            "UNAUTHORIZED",
            FailureKind::Validation,
            false,
            false,
            LogLevel::Warn,
        ),
        PipelineError::InvalidPersona(_) => (
            "INVALID_PERSONA",
            FailureKind::Validation,
            false,
            false,
            LogLevel::Warn,
        ),
        PipelineError::NotAResume => (
            "NOT_A_RESUME",
            FailureKind::BusinessRejection,
            false,
            false,
            LogLevel::Warn,
        ),
        PipelineError::Consistency(_) => (
            "CONSISTENCY_VIOLATION",
            FailureKind::Consistency,
            false,
            true,
            LogLevel::Error,
        ),
        PipelineError::Database(_) => (
            "DATABASE_ERROR",
            FailureKind::Infrastructure,
            true,
            false,
            LogLevel::Error,
        ),
        PipelineError::ObjectStore(_) => (
            "OBJECT_STORE_ERROR",
            FailureKind::Infrastructure,
            true,
            false,
            LogLevel::Error,
        ),
        PipelineError::Extraction(_) => (
            "EXTRACTION_ERROR",
            FailureKind::Infrastructure,
            false,
            false,
            LogLevel::Error,
        ),
        PipelineError::Completion(_) => (
            "COMPLETION_ERROR",
            FailureKind::Infrastructure,
            true,
            false,
            LogLevel::Error,
        ),
        PipelineError::Internal { .. } => (
            "INTERNAL_ERROR",
            FailureKind::Infrastructure,
            true,
            false,
            LogLevel::Error,
        ),
    }
}

impl PipelineError {
    /// Build a consistency violation for an update that touched the wrong number of rows.
    pub fn unexpected_rows(operation: &str, upload_id: &str, rows_affected: u64) -> Self {
        PipelineError::Consistency(format!(
            "{} for upload {} affected {} rows, expected exactly 1",
            operation, upload_id, rows_affected
        ))
    }

    /// Get the error type name
    pub fn error_type(&self) -> &str {
        match self {
            PipelineError::Validation(_) => "Validation",
            PipelineError::NotFound(_) => "NotFound",
            PipelineError::StateConflict { .. } => "StateConflict",
            PipelineError::UploadTerminal { .. } => "UploadTerminal",
            PipelineError::Unauthorized { .. } => "Unauthorized",
            PipelineError::InvalidPersona(_) => "InvalidPersona",
            PipelineError::NotAResume => "NotAResume",
            PipelineError::Consistency(_) => "Consistency",
            PipelineError::Database(_) => "Database",
            PipelineError::ObjectStore(_) => "ObjectStore",
            PipelineError::Extraction(_) => "Extraction",
            PipelineError::Completion(_) => "Completion",
            PipelineError::Internal { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for PipelineError {
    fn error_code(&self) -> &'static str {
        pipeline_error_static_metadata(self).0
    }

    fn failure_kind(&self) -> FailureKind {
        pipeline_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        pipeline_error_static_metadata(self).2
    }

    fn is_fatal(&self) -> bool {
        pipeline_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        pipeline_error_static_metadata(self).4
    }
}
