//! Resume processing pipeline
//!
//! One run per dispatched upload id:
//!
//! - **Claim**: a short transaction moves the upload NOT STARTED -> ONGOING. Losing the
//!   race is a state conflict and nothing else happens.
//! - **Process**: fetch the bytes, extract text, build the persona. No database lock is
//!   held. Any failure here marks the upload FAILED.
//! - **Finalize**: the candidate insert and the COMPLETED marker commit together. If that
//!   transaction fails the upload stays ONGOING.

use std::sync::Arc;

use vitae_core::models::{CandidateRecord, Persona, UploadRecord};
use vitae_core::{ErrorMetadata, LogLevel, PipelineError, PipelineResult};
use vitae_db::UploadLifecycleStore;
use vitae_services::{PersonaBuilder, TextExtractor};
use vitae_storage::Storage;

/// Collaborators a pipeline run needs, injected at construction.
#[derive(Clone)]
pub struct PipelineDeps {
    pub store: Arc<dyn UploadLifecycleStore>,
    pub storage: Arc<dyn Storage>,
    pub extractor: Arc<dyn TextExtractor>,
    pub persona_builder: PersonaBuilder,
}

/// How a run that got past the claim ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Candidate created and upload COMPLETED.
    Completed { candidate: CandidateRecord },
    /// Processing failed and the upload was driven to FAILED (best effort).
    Failed { error: PipelineError },
    /// The finalize transaction rolled back; the upload is still ONGOING.
    FinalizeFailed { error: PipelineError },
}

#[derive(Clone)]
pub struct ResumePipeline {
    deps: PipelineDeps,
}

impl ResumePipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        Self { deps }
    }

    /// Run claim, process and finalize for one upload.
    ///
    /// `Err` means the claim itself did not happen and the upload is untouched.
    #[tracing::instrument(skip(self))]
    pub async fn process_upload(&self, upload_id: &str) -> PipelineResult<PipelineOutcome> {
        let upload = self
            .deps
            .store
            .claim_for_processing(upload_id)
            .await
            .map_err(|e| {
                log_pipeline_error(&e, upload_id, "claim");
                e
            })?;

        let persona = match self.build_persona(&upload).await {
            Ok(persona) => persona,
            Err(e) => {
                log_pipeline_error(&e, &upload.id, "process");
                self.fail(&upload.id).await;
                return Ok(PipelineOutcome::Failed { error: e });
            }
        };

        match self.deps.store.mark_completed(&upload, &persona).await {
            Ok(candidate) => {
                tracing::info!(
                    upload_id = %upload.id,
                    team_id = %upload.team_id,
                    candidate_id = %candidate.id,
                    "Upload processed"
                );
                Ok(PipelineOutcome::Completed { candidate })
            }
            Err(e) => {
                log_pipeline_error(&e, &upload.id, "finalize");
                Ok(PipelineOutcome::FinalizeFailed { error: e })
            }
        }
    }

    async fn build_persona(&self, upload: &UploadRecord) -> PipelineResult<Persona> {
        let bytes = self
            .deps
            .storage
            .fetch_bytes(&upload.team_id, &upload.id, &upload.name)
            .await?;

        let text = self.deps.extractor.extract_text(bytes).await?;

        let mut persona = self.deps.persona_builder.build(&text).await?;
        persona.stamp_file_upload(&upload.id);
        persona.validate()?;

        Ok(persona)
    }

    /// Best effort: a failure here is logged and not retried.
    async fn fail(&self, upload_id: &str) {
        if let Err(e) = self.deps.store.mark_failed(upload_id).await {
            log_pipeline_error(&e, upload_id, "mark_failed");
        }
    }
}

/// Log a pipeline error at the level its metadata asks for.
pub(crate) fn log_pipeline_error(err: &PipelineError, upload_id: &str, phase: &'static str) {
    let kind = err.failure_kind();
    let code = err.error_code();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(
            upload_id = %upload_id,
            phase = phase,
            failure_kind = %kind,
            error_code = code,
            error = %err,
            "Pipeline step rejected"
        ),
        LogLevel::Warn => tracing::warn!(
            upload_id = %upload_id,
            phase = phase,
            failure_kind = %kind,
            error_code = code,
            error = %err,
            "Pipeline step rejected"
        ),
        LogLevel::Error if err.is_fatal() => tracing::error!(
            upload_id = %upload_id,
            phase = phase,
            failure_kind = %kind,
            error_code = code,
            alert = true,
            error = %err.detailed_message(),
            "Pipeline consistency violation"
        ),
        LogLevel::Error => tracing::error!(
            upload_id = %upload_id,
            phase = phase,
            failure_kind = %kind,
            error_code = code,
            error = %err.detailed_message(),
            "Pipeline step failed"
        ),
    }
}
