//! TaskHandlerContext implementation for the resume pipeline.
//!
//! Maps pipeline outcomes onto task results: a lost claim is a successful no-op,
//! anything that already drove the upload to a final state must not be retried.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Weak};

use vitae_core::models::{ProcessFileUploadPayload, Task, TaskType};
use vitae_core::{PipelineError, TaskError};

use crate::context::TaskHandlerContext;
use crate::pipeline::{PipelineOutcome, ResumePipeline};

pub struct UploadTaskContext {
    pipeline: ResumePipeline,
}

impl UploadTaskContext {
    pub fn new(pipeline: ResumePipeline) -> Self {
        Self { pipeline }
    }

    /// Weak handle for the task queue. Tasks fail once every strong reference to the
    /// context is gone.
    pub fn downgrade(self: &Arc<Self>) -> Weak<dyn TaskHandlerContext> {
        let context: Arc<dyn TaskHandlerContext> = self.clone();
        Arc::downgrade(&context)
    }

    #[tracing::instrument(skip(self, task), fields(task.id = %task.id, upload.id = tracing::field::Empty))]
    async fn process_file_upload(&self, task: &Task) -> Result<serde_json::Value> {
        let payload: ProcessFileUploadPayload = task.try_payload_as().map_err(|e| {
            TaskError::unrecoverable(
                anyhow::Error::new(e).context("Failed to parse process file upload payload"),
            )
        })?;
        let upload_id = payload.file_upload_id;
        tracing::Span::current().record("upload.id", upload_id.as_str());

        match self.pipeline.process_upload(&upload_id).await {
            Ok(PipelineOutcome::Completed { candidate }) => Ok(json!({
                "fileUploadId": upload_id,
                "outcome": "completed",
                "candidateId": candidate.id,
            })),
            Ok(PipelineOutcome::Failed { error }) => Err(TaskError::unrecoverable(
                anyhow::Error::new(error).context(format!("upload {} marked FAILED", upload_id)),
            )
            .into()),
            Ok(PipelineOutcome::FinalizeFailed { error }) => Err(TaskError::unrecoverable(
                anyhow::Error::new(error)
                    .context(format!("upload {} left ONGOING after finalize", upload_id)),
            )
            .into()),
            Err(PipelineError::StateConflict { .. }) => {
                tracing::debug!(upload_id = %upload_id, "Upload already claimed, dropping task");
                Ok(json!({
                    "fileUploadId": upload_id,
                    "outcome": "skipped",
                    "reason": "already claimed",
                }))
            }
            Err(e) => Err(TaskError::from(e).into()),
        }
    }
}

#[async_trait]
impl TaskHandlerContext for UploadTaskContext {
    async fn dispatch_task(self: Arc<Self>, task: &Task) -> Result<serde_json::Value> {
        match task.task_type {
            TaskType::ProcessFileUpload => self.process_file_upload(task).await,
        }
    }
}
