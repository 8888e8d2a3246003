//! Task handler context trait
//!
//! The processor implements this trait for its pipeline state. The queue calls
//! `dispatch_task` for every claimed task; the implementation matches on task type
//! and invokes the appropriate handler.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use vitae_core::models::Task;

/// Context for task dispatch.
///
/// The queue holds a weak reference so that dropping the owner stops dispatch.
#[async_trait]
pub trait TaskHandlerContext: Send + Sync {
    /// Dispatch a task to the appropriate handler and return the result.
    ///
    /// Returning a [`vitae_core::TaskError`] inside the `anyhow::Error` controls
    /// whether the queue retries.
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value>;
}
