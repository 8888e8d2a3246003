//! Candidate materialization
//!
//! Turns a built persona into a candidate and marks its upload COMPLETED in a single
//! transaction. Either both writes are visible afterwards or neither is.

use sqlx::{PgConnection, PgPool};
use vitae_core::models::{CandidateRecord, Persona, ProcessingStatus, ProcessingTransition, UploadRecord};
use vitae_core::validation::require_non_blank;
use vitae_core::{PipelineError, PipelineResult};

use super::candidate::CandidateRepository;
use super::transaction::TransactionGuard;
use super::upload::UploadRepository;

#[derive(Clone)]
pub struct CandidateMaterializer {
    pool: PgPool,
}

impl CandidateMaterializer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check that `persona` may become a candidate of `upload`.
    ///
    /// Runs before any transaction is opened.
    pub fn check(upload: &UploadRecord, persona: &Persona) -> PipelineResult<()> {
        persona.validate()?;
        require_non_blank("teamId", &upload.team_id)?;

        if persona.file_upload_id != upload.id {
            return Err(PipelineError::InvalidPersona(format!(
                "persona references upload {} but is being attached to {}",
                persona.file_upload_id, upload.id
            )));
        }
        if upload.processing_status != ProcessingStatus::Ongoing {
            return Err(PipelineError::StateConflict {
                upload_id: upload.id.clone(),
            });
        }

        Ok(())
    }

    /// Create the candidate for a claimed upload and move the upload to COMPLETED.
    #[tracing::instrument(skip(self, upload, persona), fields(upload_id = %upload.id, team_id = %upload.team_id))]
    pub async fn materialize(
        &self,
        upload: &UploadRecord,
        persona: &Persona,
    ) -> PipelineResult<CandidateRecord> {
        Self::check(upload, persona)?;

        let mut tx = TransactionGuard::begin(&self.pool, "materialize_candidate").await?;
        let result = Self::write(tx.conn(), upload, persona).await;
        let candidate = tx.finish(result).await?;

        tracing::info!(
            upload_id = %upload.id,
            candidate_id = %candidate.id,
            "Candidate materialized"
        );

        Ok(candidate)
    }

    async fn write(
        conn: &mut PgConnection,
        upload: &UploadRecord,
        persona: &Persona,
    ) -> PipelineResult<CandidateRecord> {
        UploadRepository::guarded_transition(&mut *conn, &upload.id, ProcessingTransition::COMPLETE)
            .await?;
        CandidateRepository::insert_ai_generated(&mut *conn, &upload.team_id, persona).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vitae_core::models::UploadStatus;

    fn claimed_upload() -> UploadRecord {
        UploadRecord {
            id: "fp1".to_string(),
            name: "resume.pdf".to_string(),
            object_location: "team-1/fp1/resume.pdf".to_string(),
            upload_status: UploadStatus::Success,
            processing_status: ProcessingStatus::Ongoing,
            team_id: "team-1".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn built_persona(file_upload_id: &str) -> Persona {
        let mut persona = Persona {
            name: "Ada Lovelace".to_string(),
            ..Default::default()
        };
        persona.stamp_builder();
        persona.stamp_file_upload(file_upload_id);
        persona
    }

    #[test]
    fn test_check_accepts_matching_persona() {
        assert!(CandidateMaterializer::check(&claimed_upload(), &built_persona("fp1")).is_ok());
    }

    #[test]
    fn test_check_rejects_blank_name() {
        let mut persona = built_persona("fp1");
        persona.name = "  ".to_string();
        let err = CandidateMaterializer::check(&claimed_upload(), &persona).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPersona(_)));
    }

    #[test]
    fn test_check_rejects_foreign_upload_id() {
        let err =
            CandidateMaterializer::check(&claimed_upload(), &built_persona("fp2")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPersona(_)));
    }

    #[test]
    fn test_check_rejects_unclaimed_upload() {
        let mut upload = claimed_upload();
        upload.processing_status = ProcessingStatus::NotStarted;
        let err = CandidateMaterializer::check(&upload, &built_persona("fp1")).unwrap_err();
        assert!(matches!(err, PipelineError::StateConflict { .. }));
    }

    #[test]
    fn test_check_rejects_blank_team() {
        let mut upload = claimed_upload();
        upload.team_id = String::new();
        let err = CandidateMaterializer::check(&upload, &built_persona("fp1")).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
