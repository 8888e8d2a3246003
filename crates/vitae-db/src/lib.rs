//! Vitae Database Layer
//!
//! This crate provides the Postgres repositories backing the upload processing
//! pipeline: the upload record store with its conditional-update state machine,
//! the candidate store, the durable task queue table, and the candidate materializer
//! that commits a persona atomically with the COMPLETED marker.

// Module declarations
pub mod db;
pub mod lifecycle;

// Re-exports: Repositories
pub use db::{CandidateMaterializer, CandidateRepository, TaskRepository, UploadRepository};

// Re-exports: Transaction utilities
pub use db::transaction::TransactionGuard;

// Re-exports: Lifecycle store seam used by the scheduler and worker pipeline
pub use lifecycle::{PgUploadLifecycle, UploadLifecycleStore};
