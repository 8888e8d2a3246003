//! Dispatcher seam between the scheduler and the task queue.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;
use vitae_core::models::TaskType;

/// Opaque receipt for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchHandle {
    pub task_id: Uuid,
    /// The submission was folded into a task that was already outstanding.
    pub deduplicated: bool,
}

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Submit a unit of work, coalescing with any outstanding unit of the same
    /// `kind` and `key`.
    ///
    /// Delivery is at least once; the pipeline's claim guard makes a repeated
    /// delivery harmless.
    async fn submit_unique(
        &self,
        kind: TaskType,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<DispatchHandle>;
}
