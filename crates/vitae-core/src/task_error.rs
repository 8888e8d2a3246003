//! Task execution error types
//!
//! A handler returns a [`TaskError`] to tell the task queue whether the failed unit
//! of work may be attempted again. A lost claim race or a pipeline run that already
//! drove its upload to FAILED must never be retried; a database outage before the
//! claim committed can be.

use std::fmt;

use crate::error::{ErrorMetadata, PipelineError};

/// Task execution error that can be either recoverable or unrecoverable
#[derive(Debug)]
pub struct TaskError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl TaskError {
    /// Create a new unrecoverable task error
    ///
    /// The queue marks the task failed immediately without retrying.
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Create a new recoverable task error
    ///
    /// The queue retries according to the task's retry budget.
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    /// Check if this error is recoverable (should be retried)
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Get the inner error
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Consume self and return the inner error
    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for TaskError {
    /// Default conversion from anyhow::Error creates a recoverable error
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

impl From<PipelineError> for TaskError {
    /// Recoverability follows the error's own metadata
    fn from(err: PipelineError) -> Self {
        if err.is_recoverable() {
            Self::recoverable(err)
        } else {
            Self::unrecoverable(err)
        }
    }
}
