//! Vitae Storage Library
//!
//! This crate provides the object store collaborator used by the processing pipeline
//! to read uploaded resume bytes. It includes the Storage trait and implementations
//! for S3 (and S3-compatible providers) and the local filesystem.
//!
//! # Object key format
//!
//! Every backend uses the same key layout: `{team_id}/{upload_id}/{file_name}`.
//! Keys are built and validated in the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::object_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
pub use vitae_core::StorageBackend;
