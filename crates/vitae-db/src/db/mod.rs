//! Database repositories for the data access layer
//!
//! Functions that take `&mut PgConnection` work the same against a pooled connection
//! and an open transaction, so claim and finalize logic does not care which one it
//! is handed.
//
// Upload record store and state machine primitives
pub mod upload;
//
// Candidates and the transactional materializer
pub mod candidate;
pub mod materializer;
//
// Durable dispatcher queue
pub mod task;
//
// Transaction utilities
pub mod transaction;

pub use candidate::CandidateRepository;
pub use materializer::CandidateMaterializer;
pub use task::TaskRepository;
pub use upload::UploadRepository;
