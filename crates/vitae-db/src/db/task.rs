use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use vitae_core::constants::TASK_NOTIFY_CHANNEL;
use vitae_core::models::{Task, TaskType};

/// Repository for the durable dispatcher queue
#[derive(Clone)]
pub struct TaskRepository {
    pool: PgPool,
}

impl TaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Enqueue a task unless one with the same `(task_type, dedup_key)` is still outstanding.
    ///
    /// Returns the task that now represents the work and whether it was created by this
    /// call. Outstanding means pending, scheduled or running; the partial unique index on
    /// the tasks table enforces this under concurrent submitters.
    #[tracing::instrument(skip(self, payload))]
    pub async fn submit_unique(
        &self,
        task_type: TaskType,
        dedup_key: &str,
        payload: serde_json::Value,
        max_retries: i32,
        timeout_seconds: Option<i32>,
    ) -> Result<(Task, bool)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction for task submission")?;

        let inserted: Option<Task> = sqlx::query_as::<Postgres, Task>(
            r#"
            INSERT INTO tasks (task_type, status, dedup_key, payload, max_retries, timeout_seconds)
            VALUES ($1, 'pending', $2, $3, $4, $5)
            ON CONFLICT (task_type, dedup_key) WHERE status IN ('pending', 'scheduled', 'running')
            DO NOTHING
            RETURNING
                id,
                task_type,
                status,
                dedup_key,
                payload,
                result,
                scheduled_at,
                started_at,
                completed_at,
                retry_count,
                max_retries,
                timeout_seconds,
                created_at,
                updated_at
            "#,
        )
        .bind(task_type.to_string())
        .bind(dedup_key)
        .bind(payload)
        .bind(max_retries)
        .bind(timeout_seconds)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                task_type = %task_type,
                dedup_key = %dedup_key,
                "Failed to insert task into database"
            );
            anyhow::anyhow!("Failed to insert task into database: {}", e)
        })?;

        let Some(task) = inserted else {
            let existing: Task = sqlx::query_as::<Postgres, Task>(
                r#"
                SELECT
                    id,
                    task_type,
                    status,
                    dedup_key,
                    payload,
                    result,
                    scheduled_at,
                    started_at,
                    completed_at,
                    retry_count,
                    max_retries,
                    timeout_seconds,
                    created_at,
                    updated_at
                FROM tasks
                WHERE task_type = $1
                    AND dedup_key = $2
                    AND status IN ('pending', 'scheduled', 'running')
                "#,
            )
            .bind(task_type.to_string())
            .bind(dedup_key)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to fetch outstanding task for dedup key")?;

            tx.commit().await.context("Failed to commit transaction")?;

            tracing::debug!(
                task_id = %existing.id,
                task_type = %task_type,
                dedup_key = %dedup_key,
                "Outstanding task found, submission coalesced"
            );

            return Ok((existing, false));
        };

        // Workers poll anyway, so a lost notification only delays pickup
        if let Err(e) = sqlx::query("SELECT pg_notify($1, '')")
            .bind(TASK_NOTIFY_CHANNEL)
            .execute(&mut *tx)
            .await
        {
            tracing::warn!(
                error = %e,
                task_id = %task.id,
                "Failed to send pg_notify for new task, workers will discover task via polling"
            );
        }

        tx.commit().await.map_err(|e| {
            tracing::error!(
                error = %e,
                task_id = %task.id,
                "Failed to commit transaction for task creation"
            );
            anyhow::anyhow!("Failed to commit transaction: {}", e)
        })?;

        tracing::info!(
            task_id = %task.id,
            task_type = %task_type,
            dedup_key = %dedup_key,
            "Task created"
        );

        Ok((task, true))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, task_id: Uuid) -> Result<Option<Task>> {
        let task: Option<Task> = sqlx::query_as::<Postgres, Task>(
            r#"
            SELECT
                id,
                task_type,
                status,
                dedup_key,
                payload,
                result,
                scheduled_at,
                started_at,
                completed_at,
                retry_count,
                max_retries,
                timeout_seconds,
                created_at,
                updated_at
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch task")?;

        Ok(task)
    }

    /// Atomically claim the oldest runnable task.
    ///
    /// `FOR UPDATE SKIP LOCKED` lets several workers claim concurrently without
    /// blocking on each other's rows.
    #[tracing::instrument(skip(self))]
    pub async fn claim_next_task(&self) -> Result<Option<Task>> {
        let task: Option<Task> = sqlx::query_as::<Postgres, Task>(
            r#"
            UPDATE tasks
            SET status = 'running',
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = (
                SELECT id
                FROM tasks
                WHERE status IN ('pending', 'scheduled')
                    AND scheduled_at <= NOW()
                ORDER BY scheduled_at ASC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING
                id,
                task_type,
                status,
                dedup_key,
                payload,
                result,
                scheduled_at,
                started_at,
                completed_at,
                retry_count,
                max_retries,
                timeout_seconds,
                created_at,
                updated_at
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to claim next task")?;

        if let Some(ref task) = task {
            tracing::debug!(
                task_id = %task.id,
                task_type = %task.task_type,
                dedup_key = ?task.dedup_key,
                "Task claimed"
            );
        }

        Ok(task)
    }

    /// Mark task as completed with result
    #[tracing::instrument(skip(self, result))]
    pub async fn mark_completed(&self, task_id: Uuid, result: serde_json::Value) -> Result<Task> {
        let task: Task = sqlx::query_as::<Postgres, Task>(
            r#"
            UPDATE tasks
            SET status = 'completed',
                result = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id,
                task_type,
                status,
                dedup_key,
                payload,
                result,
                scheduled_at,
                started_at,
                completed_at,
                retry_count,
                max_retries,
                timeout_seconds,
                created_at,
                updated_at
            "#,
        )
        .bind(task_id)
        .bind(result)
        .fetch_one(&self.pool)
        .await
        .context("Failed to mark task as completed")?;

        tracing::info!(
            task_id = %task_id,
            task_type = %task.task_type,
            "Task completed"
        );

        Ok(task)
    }

    /// Mark task as failed with error details
    #[tracing::instrument(skip(self, error))]
    pub async fn mark_failed(&self, task_id: Uuid, error: serde_json::Value) -> Result<Task> {
        let task: Task = sqlx::query_as::<Postgres, Task>(
            r#"
            UPDATE tasks
            SET status = 'failed',
                result = $2,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id,
                task_type,
                status,
                dedup_key,
                payload,
                result,
                scheduled_at,
                started_at,
                completed_at,
                retry_count,
                max_retries,
                timeout_seconds,
                created_at,
                updated_at
            "#,
        )
        .bind(task_id)
        .bind(error)
        .fetch_one(&self.pool)
        .await
        .context("Failed to mark task as failed")?;

        tracing::error!(
            task_id = %task_id,
            task_type = %task.task_type,
            retry_count = task.retry_count,
            "Task failed"
        );

        Ok(task)
    }

    /// Put a task back in the queue after `backoff_seconds`, counting the attempt.
    #[tracing::instrument(skip(self))]
    pub async fn schedule_retry(&self, task_id: Uuid, backoff_seconds: u64) -> Result<Task> {
        let task: Task = sqlx::query_as::<Postgres, Task>(
            r#"
            UPDATE tasks
            SET status = 'scheduled',
                retry_count = retry_count + 1,
                scheduled_at = NOW() + ($2 * interval '1 second'),
                started_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING
                id,
                task_type,
                status,
                dedup_key,
                payload,
                result,
                scheduled_at,
                started_at,
                completed_at,
                retry_count,
                max_retries,
                timeout_seconds,
                created_at,
                updated_at
            "#,
        )
        .bind(task_id)
        .bind(backoff_seconds as i64)
        .fetch_one(&self.pool)
        .await
        .context("Failed to schedule task retry")?;

        tracing::info!(
            task_id = %task_id,
            retry_count = task.retry_count,
            max_retries = task.max_retries,
            scheduled_at = %task.scheduled_at,
            "Task retry scheduled"
        );

        Ok(task)
    }

    /// Return running tasks whose worker vanished to the queue.
    ///
    /// A task counts as stale once it has been running longer than its timeout plus
    /// `grace_period_secs`. Stale tasks with retries left go back to pending, the rest fail.
    /// Returns the number of tasks touched.
    #[tracing::instrument(skip(self))]
    pub async fn reap_stale_running_tasks(&self, grace_period_secs: i64) -> Result<u64> {
        let rescheduled = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'pending',
                retry_count = retry_count + 1,
                scheduled_at = NOW(),
                started_at = NULL,
                updated_at = NOW()
            WHERE status = 'running'
                AND retry_count < max_retries
                AND started_at < NOW() - ((COALESCE(timeout_seconds, 3600) + $1) * interval '1 second')
            "#,
        )
        .bind(grace_period_secs)
        .execute(&self.pool)
        .await
        .context("Failed to reschedule stale running tasks")?
        .rows_affected();

        let failed = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'failed',
                result = jsonb_build_object('error', 'Task abandoned by worker', 'retry_count', retry_count),
                completed_at = NOW(),
                updated_at = NOW()
            WHERE status = 'running'
                AND retry_count >= max_retries
                AND started_at < NOW() - ((COALESCE(timeout_seconds, 3600) + $1) * interval '1 second')
            "#,
        )
        .bind(grace_period_secs)
        .execute(&self.pool)
        .await
        .context("Failed to fail stale running tasks")?
        .rows_affected();

        if rescheduled + failed > 0 {
            tracing::warn!(
                rescheduled = rescheduled,
                failed = failed,
                grace_period_secs = grace_period_secs,
                "Reaped stale running tasks"
            );
        }

        Ok(rescheduled + failed)
    }

    /// Delete finished tasks (completed, failed, cancelled) older than the given number of days.
    /// Returns the number of rows deleted.
    #[tracing::instrument(skip(self))]
    pub async fn delete_old_finished_tasks(&self, older_than_days: i32) -> Result<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE status IN ('completed', 'failed', 'cancelled')
                AND COALESCE(completed_at, updated_at) < NOW() - ($1 * interval '1 day')
            "#,
        )
        .bind(older_than_days)
        .execute(&self.pool)
        .await
        .context("Failed to delete old finished tasks")?
        .rows_affected();

        if deleted > 0 {
            tracing::info!(
                count = deleted,
                older_than_days = older_than_days,
                "Deleted old finished tasks"
            );
        }

        Ok(deleted)
    }
}
