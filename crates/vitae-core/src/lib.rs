//! Vitae Core Library
//!
//! This crate provides the domain models, error types, configuration, and validation
//! shared by the upload processing pipeline: the upload lifecycle state machine,
//! personas and candidates, and the durable task records used by the dispatcher.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;
pub mod task_error;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{ErrorMetadata, FailureKind, LogLevel, PipelineError, PipelineResult};
pub use storage_types::StorageBackend;
pub use task_error::TaskError;
