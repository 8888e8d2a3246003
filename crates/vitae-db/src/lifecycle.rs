//! Upload lifecycle store abstraction
//!
//! The scheduler and the worker pipeline only need four operations from the upload
//! store. Keeping them behind a trait lets the pipeline be exercised against an
//! in-memory store without a database.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use vitae_core::models::{CandidateRecord, Persona, ProcessingTransition, UploadRecord};
use vitae_core::validation::require_non_blank;
use vitae_core::{PipelineError, PipelineResult};

use crate::db::materializer::CandidateMaterializer;
use crate::db::transaction::TransactionGuard;
use crate::db::upload::UploadRepository;

#[async_trait]
pub trait UploadLifecycleStore: Send + Sync {
    /// Uploads with a successful transfer that nobody has claimed, oldest first.
    async fn list_eligible_for_processing(&self) -> PipelineResult<Vec<UploadRecord>>;

    /// Move an eligible upload to ONGOING and return it.
    ///
    /// Exactly one of any number of concurrent callers succeeds; the others get
    /// [`PipelineError::StateConflict`].
    async fn claim_for_processing(&self, upload_id: &str) -> PipelineResult<UploadRecord>;

    /// Create the candidate for a claimed upload and mark it COMPLETED, atomically.
    ///
    /// An upload that is no longer ONGOING is a [`PipelineError::StateConflict`].
    async fn mark_completed(
        &self,
        upload: &UploadRecord,
        persona: &Persona,
    ) -> PipelineResult<CandidateRecord>;

    /// Mark a claimed upload FAILED.
    ///
    /// An upload that is not ONGOING is a [`PipelineError::StateConflict`] and stays as it is.
    async fn mark_failed(&self, upload_id: &str) -> PipelineResult<()>;
}

/// Postgres-backed lifecycle store
#[derive(Clone)]
pub struct PgUploadLifecycle {
    pool: PgPool,
    uploads: UploadRepository,
    materializer: CandidateMaterializer,
}

impl PgUploadLifecycle {
    pub fn new(pool: PgPool) -> Self {
        Self {
            uploads: UploadRepository::new(pool.clone()),
            materializer: CandidateMaterializer::new(pool.clone()),
            pool,
        }
    }

    async fn claim_locked(conn: &mut PgConnection, upload_id: &str) -> PipelineResult<UploadRecord> {
        let mut upload = UploadRepository::fetch_for_update(&mut *conn, upload_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("file upload {}", upload_id)))?;

        if !upload.is_eligible_for_processing() {
            return Err(PipelineError::StateConflict {
                upload_id: upload_id.to_string(),
            });
        }

        UploadRepository::apply_transition(&mut *conn, upload_id, ProcessingTransition::CLAIM)
            .await?;
        upload.processing_status = ProcessingTransition::CLAIM.to();

        Ok(upload)
    }
}

#[async_trait]
impl UploadLifecycleStore for PgUploadLifecycle {
    async fn list_eligible_for_processing(&self) -> PipelineResult<Vec<UploadRecord>> {
        self.uploads.list_eligible_for_processing().await
    }

    #[tracing::instrument(skip(self))]
    async fn claim_for_processing(&self, upload_id: &str) -> PipelineResult<UploadRecord> {
        require_non_blank("fileUploadId", upload_id)?;

        let mut tx = TransactionGuard::begin(&self.pool, "claim_for_processing").await?;
        let result = Self::claim_locked(tx.conn(), upload_id).await;
        let upload = tx.finish(result).await?;

        tracing::info!(upload_id = %upload.id, team_id = %upload.team_id, "Upload claimed for processing");
        Ok(upload)
    }

    async fn mark_completed(
        &self,
        upload: &UploadRecord,
        persona: &Persona,
    ) -> PipelineResult<CandidateRecord> {
        self.materializer.materialize(upload, persona).await
    }

    #[tracing::instrument(skip(self))]
    async fn mark_failed(&self, upload_id: &str) -> PipelineResult<()> {
        let mut tx = TransactionGuard::begin(&self.pool, "mark_failed").await?;
        let result =
            UploadRepository::guarded_transition(tx.conn(), upload_id, ProcessingTransition::FAIL)
                .await;
        tx.finish(result).await?;

        tracing::info!(upload_id = %upload_id, "Upload marked as failed");
        Ok(())
    }
}
