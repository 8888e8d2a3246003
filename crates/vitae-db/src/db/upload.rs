use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;
use vitae_core::models::{ProcessingStatus, ProcessingTransition, UploadRecord, UploadStatus};
use vitae_core::validation::{require_non_blank, require_path_segment};
use vitae_core::{PipelineError, PipelineResult};
use vitae_storage::object_key;

use super::transaction::TransactionGuard;

/// Repository for file upload records and their processing state machine
#[derive(Clone)]
pub struct UploadRepository {
    pool: PgPool,
}

impl UploadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a new upload for `team_id`, returning the record in `INITIATED` / `NOT STARTED`.
    ///
    /// The object location is derived from the team, the generated id and the file name,
    /// so the client can put the bytes there before calling [`Self::complete_transfer`].
    #[tracing::instrument(skip(self), fields(db.table = "file_uploads", db.operation = "insert"))]
    pub async fn create_for_team(&self, team_id: &str, name: &str) -> PipelineResult<UploadRecord> {
        require_path_segment("teamId", team_id)?;
        require_path_segment("name", name)?;

        let id = Uuid::new_v4().to_string();
        let object_location = object_key(team_id, &id, name)?;

        let record = sqlx::query_as::<Postgres, UploadRecord>(
            r#"
            INSERT INTO file_uploads (id, name, object_location, status, processing_status, team_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, object_location, status, processing_status, team_id, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(name)
        .bind(&object_location)
        .bind(UploadStatus::Initiated.as_str())
        .bind(ProcessingStatus::NotStarted.as_str())
        .bind(team_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(upload_id = %record.id, team_id = %team_id, "Upload registered");

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_uploads", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: &str) -> PipelineResult<Option<UploadRecord>> {
        let record = sqlx::query_as::<Postgres, UploadRecord>(
            "SELECT id, name, object_location, status, processing_status, team_id, created_at, updated_at FROM file_uploads WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Get an upload by id (team-scoped)
    #[tracing::instrument(skip(self), fields(db.table = "file_uploads", db.operation = "select", db.record_id = %id))]
    pub async fn get_for_team(&self, team_id: &str, id: &str) -> PipelineResult<Option<UploadRecord>> {
        let record = sqlx::query_as::<Postgres, UploadRecord>(
            "SELECT id, name, object_location, status, processing_status, team_id, created_at, updated_at FROM file_uploads WHERE team_id = $1 AND id = $2",
        )
        .bind(team_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// List a team's uploads, newest first
    #[tracing::instrument(skip(self), fields(db.table = "file_uploads", db.operation = "select"))]
    pub async fn list_for_team(&self, team_id: &str) -> PipelineResult<Vec<UploadRecord>> {
        let records = sqlx::query_as::<Postgres, UploadRecord>(
            "SELECT id, name, object_location, status, processing_status, team_id, created_at, updated_at FROM file_uploads WHERE team_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Number of the team's uploads that have not reached a finished processing state.
    #[tracing::instrument(skip(self), fields(db.table = "file_uploads", db.operation = "select"))]
    pub async fn count_unprocessed_for_team(&self, team_id: &str) -> PipelineResult<i64> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM file_uploads WHERE team_id = $1 AND processing_status IN ($2, $3)",
        )
        .bind(team_id)
        .bind(ProcessingStatus::NotStarted.as_str())
        .bind(ProcessingStatus::Ongoing.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Uploads whose transfer succeeded and which nobody has claimed yet, oldest first.
    ///
    /// `id` breaks ties so the order is stable across ticks.
    #[tracing::instrument(skip(self), fields(db.table = "file_uploads", db.operation = "select"))]
    pub async fn list_eligible_for_processing(&self) -> PipelineResult<Vec<UploadRecord>> {
        let records = sqlx::query_as::<Postgres, UploadRecord>(
            r#"
            SELECT id, name, object_location, status, processing_status, team_id, created_at, updated_at
            FROM file_uploads
            WHERE status = $1 AND processing_status = $2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(UploadStatus::Success.as_str())
        .bind(ProcessingStatus::NotStarted.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Record the outcome of the client's object transfer.
    ///
    /// Only the owning team may complete a transfer, only once, and only with a
    /// terminal status.
    #[tracing::instrument(skip(self), fields(db.table = "file_uploads", db.operation = "update", db.record_id = %id))]
    pub async fn complete_transfer(
        &self,
        team_id: &str,
        id: &str,
        status: UploadStatus,
    ) -> PipelineResult<UploadRecord> {
        require_non_blank("fileUploadId", id)?;
        if !status.is_terminal() {
            return Err(PipelineError::Validation(format!(
                "upload status must be {} or {}, got {}",
                UploadStatus::Success,
                UploadStatus::Failure,
                status
            )));
        }

        let mut tx = TransactionGuard::begin(&self.pool, "complete_transfer").await?;
        let result = Self::complete_transfer_locked(tx.conn(), team_id, id, status).await;
        tx.finish(result).await
    }

    async fn complete_transfer_locked(
        conn: &mut PgConnection,
        team_id: &str,
        id: &str,
        status: UploadStatus,
    ) -> PipelineResult<UploadRecord> {
        let current = Self::fetch_for_update(&mut *conn, id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("file upload {}", id)))?;

        if !current.belongs_to_team(team_id) {
            return Err(PipelineError::Unauthorized {
                upload_id: id.to_string(),
            });
        }
        if current.upload_status.is_terminal() {
            return Err(PipelineError::UploadTerminal {
                upload_id: id.to_string(),
            });
        }

        sqlx::query_as::<Postgres, UploadRecord>(
            r#"
            UPDATE file_uploads
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING id, name, object_location, status, processing_status, team_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(UploadStatus::Initiated.as_str())
        .bind(status.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| PipelineError::unexpected_rows("complete_transfer", id, 0))
    }

    /// Read an upload and hold its row lock until the surrounding transaction ends.
    ///
    /// Concurrent claimers serialize here; the second one sees the first one's write.
    pub async fn fetch_for_update(
        conn: &mut PgConnection,
        id: &str,
    ) -> PipelineResult<Option<UploadRecord>> {
        let record = sqlx::query_as::<Postgres, UploadRecord>(
            "SELECT id, name, object_location, status, processing_status, team_id, created_at, updated_at FROM file_uploads WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(record)
    }

    /// Move an upload from `expected` to `next`.
    ///
    /// Pairs outside the state machine are a [`PipelineError::StateConflict`] and never reach
    /// the database.
    pub async fn transition(
        conn: &mut PgConnection,
        id: &str,
        expected: ProcessingStatus,
        next: ProcessingStatus,
    ) -> PipelineResult<()> {
        let transition = ProcessingTransition::between(expected, next).ok_or_else(|| {
            PipelineError::StateConflict {
                upload_id: id.to_string(),
            }
        })?;
        Self::guarded_transition(conn, id, transition).await
    }

    /// Lock the row, check it sits in `transition.from()`, then apply the transition.
    ///
    /// A row in any other state is a [`PipelineError::StateConflict`] and is left as it
    /// was. A missing row is [`PipelineError::NotFound`].
    pub async fn guarded_transition(
        conn: &mut PgConnection,
        id: &str,
        transition: ProcessingTransition,
    ) -> PipelineResult<()> {
        let upload = Self::fetch_for_update(&mut *conn, id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("file upload {}", id)))?;

        if upload.processing_status != transition.from() {
            tracing::debug!(
                upload_id = %id,
                transition = %transition,
                current = %upload.processing_status,
                "Upload is not in the expected processing state"
            );
            return Err(PipelineError::StateConflict {
                upload_id: id.to_string(),
            });
        }

        Self::apply_transition(conn, id, transition).await
    }

    /// Conditional update guarded on the current processing status.
    ///
    /// Exactly one row must change. Anything else means the record moved underneath a
    /// caller that believed it held the state, and is reported as
    /// [`PipelineError::Consistency`].
    pub async fn apply_transition(
        conn: &mut PgConnection,
        id: &str,
        transition: ProcessingTransition,
    ) -> PipelineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE file_uploads
            SET processing_status = $3, updated_at = NOW()
            WHERE id = $1 AND processing_status = $2
            "#,
        )
        .bind(id)
        .bind(transition.from().as_str())
        .bind(transition.to().as_str())
        .execute(&mut *conn)
        .await?;

        let rows = result.rows_affected();
        if rows != 1 {
            tracing::error!(
                upload_id = %id,
                transition = %transition,
                rows_affected = rows,
                "Processing status update did not affect exactly one row"
            );
            return Err(PipelineError::unexpected_rows(
                &transition.to_string(),
                id,
                rows,
            ));
        }

        tracing::debug!(upload_id = %id, transition = %transition, "Processing status updated");
        Ok(())
    }
}
