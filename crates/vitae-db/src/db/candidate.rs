use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;
use vitae_core::models::{CandidateRecord, Persona};
use vitae_core::validation::require_non_blank;
use vitae_core::{PipelineError, PipelineResult};

/// Repository for candidates built from processed uploads
#[derive(Clone)]
pub struct CandidateRepository {
    pool: PgPool,
}

impl CandidateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a candidate carrying an AI-generated persona.
    ///
    /// Runs on whatever connection it is given so the materializer can put it in the
    /// same transaction as the COMPLETED transition. A second candidate for the same
    /// upload violates the unique index and is reported as a consistency error.
    pub async fn insert_ai_generated(
        conn: &mut PgConnection,
        team_id: &str,
        persona: &Persona,
    ) -> PipelineResult<CandidateRecord> {
        let id = Uuid::new_v4().to_string();

        let result = sqlx::query_as::<Postgres, CandidateRecord>(
            r#"
            INSERT INTO candidates (id, team_id, file_upload_id, ai_generated_persona)
            VALUES ($1, $2, $3, $4)
            RETURNING id, team_id, file_upload_id, ai_generated_persona, manually_created_persona, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(team_id)
        .bind(&persona.file_upload_id)
        .bind(Json(persona))
        .fetch_one(&mut *conn)
        .await;

        match result {
            Ok(candidate) => Ok(candidate),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(PipelineError::Consistency(format!(
                    "candidate already exists for upload {}",
                    persona.file_upload_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "candidates", db.operation = "select"))]
    pub async fn list_for_team(&self, team_id: &str) -> PipelineResult<Vec<CandidateRecord>> {
        let candidates = sqlx::query_as::<Postgres, CandidateRecord>(
            "SELECT id, team_id, file_upload_id, ai_generated_persona, manually_created_persona, created_at, updated_at FROM candidates WHERE team_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }

    /// Get candidate by ID (team-scoped)
    #[tracing::instrument(skip(self), fields(db.table = "candidates", db.operation = "select", db.record_id = %id))]
    pub async fn get_for_team(
        &self,
        team_id: &str,
        id: &str,
    ) -> PipelineResult<Option<CandidateRecord>> {
        let candidate = sqlx::query_as::<Postgres, CandidateRecord>(
            "SELECT id, team_id, file_upload_id, ai_generated_persona, manually_created_persona, created_at, updated_at FROM candidates WHERE team_id = $1 AND id = $2",
        )
        .bind(team_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(candidate)
    }

    #[tracing::instrument(skip(self), fields(db.table = "candidates", db.operation = "select"))]
    pub async fn get_by_file_upload_id(
        &self,
        file_upload_id: &str,
    ) -> PipelineResult<Option<CandidateRecord>> {
        let candidate = sqlx::query_as::<Postgres, CandidateRecord>(
            "SELECT id, team_id, file_upload_id, ai_generated_persona, manually_created_persona, created_at, updated_at FROM candidates WHERE file_upload_id = $1",
        )
        .bind(file_upload_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(candidate)
    }

    /// Replace the manually curated persona of a team's candidate.
    ///
    /// The AI-generated persona is left untouched.
    #[tracing::instrument(skip(self, persona), fields(db.table = "candidates", db.operation = "update", db.record_id = %id))]
    pub async fn update_manual_persona_for_team(
        &self,
        team_id: &str,
        id: &str,
        persona: &Persona,
    ) -> PipelineResult<CandidateRecord> {
        require_non_blank("candidateId", id)?;
        if !persona.is_valid() {
            return Err(PipelineError::InvalidPersona(
                "persona name cannot be blank".to_string(),
            ));
        }

        sqlx::query_as::<Postgres, CandidateRecord>(
            r#"
            UPDATE candidates
            SET manually_created_persona = $3, updated_at = NOW()
            WHERE team_id = $1 AND id = $2
            RETURNING id, team_id, file_upload_id, ai_generated_persona, manually_created_persona, created_at, updated_at
            "#,
        )
        .bind(team_id)
        .bind(id)
        .bind(Json(persona))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("candidate {}", id)))
    }
}
