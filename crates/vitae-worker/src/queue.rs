//! Task queue: worker pool, LISTEN/NOTIFY or polling, retry, and submission.
//!
//! Shutdown: [`TaskQueue::shutdown`] stops claiming and waits for in-flight tasks to
//! finish; it never cancels them. A pipeline run that has claimed its upload always
//! runs to a finished state.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::sleep;

use vitae_core::constants::TASK_NOTIFY_CHANNEL;
use vitae_core::models::{Task, TaskType};
use vitae_core::TaskError;
use vitae_db::TaskRepository;

use crate::context::TaskHandlerContext;
use crate::dispatcher::{DispatchHandle, Dispatcher};

/// Maximum delay in seconds before retrying a failed task.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Computes backoff in seconds for a given retry count (exponential with cap).
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: i32) -> u64 {
    2_u64
        .checked_pow(retry_count.max(0) as u32)
        .unwrap_or(u64::MAX)
        .min(MAX_RETRY_BACKOFF_SECS)
}

/// Whether the queue should give up on a failed task without retrying.
pub(crate) fn is_unrecoverable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<TaskError>()
        .map(|te| !te.is_recoverable())
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    pub poll_interval_ms: u64,
    pub default_timeout_seconds: i32,
    pub max_retries: i32,
    /// Interval in seconds between runs of the stale task reaper and retention cleanup.
    pub stale_task_reap_interval_secs: u64,
    /// Grace period in seconds added to task timeout before reaping stale running tasks.
    pub stale_task_grace_period_secs: i64,
    /// Finished tasks older than this many days are deleted. Zero disables cleanup.
    pub retention_days: i32,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 1000,
            default_timeout_seconds: 600,
            max_retries: 3,
            stale_task_reap_interval_secs: 60,
            stale_task_grace_period_secs: 300,
            retention_days: 30,
        }
    }
}

impl TaskQueueConfig {
    pub fn from_config(config: &vitae_core::Config) -> Self {
        Self {
            max_workers: config.task_queue_max_workers,
            poll_interval_ms: config.task_queue_poll_interval_ms,
            default_timeout_seconds: config.task_queue_default_timeout_seconds,
            max_retries: config.task_queue_max_retries,
            stale_task_reap_interval_secs: config.task_queue_stale_task_reap_interval_secs,
            stale_task_grace_period_secs: config.task_queue_stale_task_grace_period_secs,
            retention_days: config.task_retention_days,
        }
    }
}

pub struct TaskQueue {
    repository: TaskRepository,
    config: TaskQueueConfig,
    shutdown_tx: mpsc::Sender<()>,
    stopped_rx: watch::Receiver<bool>,
}

impl TaskQueue {
    /// Create a new TaskQueue and spawn its worker pool.
    ///
    /// If `pool` is `Some`, the worker uses PostgreSQL LISTEN/NOTIFY to wake immediately
    /// when tasks are created, in addition to polling at `poll_interval_ms`.
    /// If `pool` is `None`, only polling is used.
    pub fn new(
        repository: TaskRepository,
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        pool: Option<sqlx::PgPool>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (stopped_tx, stopped_rx) = watch::channel(false);

        let repo_clone = repository.clone();
        let config_clone = config.clone();

        tokio::spawn(async move {
            Self::worker_pool(repo_clone, config_clone, context, shutdown_rx, pool).await;
            let _ = stopped_tx.send(true);
        });

        Self {
            repository,
            config,
            shutdown_tx,
            stopped_rx,
        }
    }

    async fn worker_pool(
        repository: TaskRepository,
        config: TaskQueueConfig,
        context: Weak<dyn TaskHandlerContext>,
        mut shutdown_rx: mpsc::Receiver<()>,
        pool: Option<sqlx::PgPool>,
    ) {
        let use_listen = pool.is_some();
        tracing::info!(
            max_workers = config.max_workers,
            poll_interval_ms = config.poll_interval_ms,
            listen_notify = use_listen,
            "Task queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers));
        let poll_interval = Duration::from_millis(config.poll_interval_ms);

        // Wakes the main loop when LISTEN receives a NOTIFY
        let (notify_tx, mut notify_rx) = mpsc::channel::<()>(16);
        if let Some(pool) = pool {
            let tx = notify_tx.clone();
            tokio::spawn(async move {
                loop {
                    match sqlx::postgres::PgListener::connect_with(&pool).await {
                        Ok(mut listener) => {
                            if let Err(e) = listener.listen(TASK_NOTIFY_CHANNEL).await {
                                tracing::warn!(error = %e, "LISTEN failed, will retry");
                                tokio::time::sleep(Duration::from_secs(5)).await;
                                continue;
                            }
                            while listener.recv().await.is_ok() {
                                if tx.send(()).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "PgListener connect failed, will retry");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            });
        }
        drop(notify_tx);

        let (maintenance_shutdown_tx, maintenance_shutdown_rx) = mpsc::channel::<()>(1);
        if config.stale_task_reap_interval_secs > 0 {
            tokio::spawn(Self::maintenance_loop(
                repository.clone(),
                config.clone(),
                maintenance_shutdown_rx,
            ));
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Task queue worker pool shutting down");
                    let _ = maintenance_shutdown_tx.send(()).await;
                    break;
                }
                Some(_) = notify_rx.recv() => {
                    Self::claim_and_dispatch_one(&repository, &semaphore, &context).await;
                }
                _ = sleep(poll_interval) => {
                    Self::claim_and_dispatch_one(&repository, &semaphore, &context).await;
                }
            }
        }

        // Every permit back means every spawned task has finished
        let in_flight = config.max_workers - semaphore.available_permits();
        if in_flight > 0 {
            tracing::info!(in_flight = in_flight, "Waiting for in-flight tasks");
        }
        let _ = semaphore.acquire_many(config.max_workers as u32).await;

        tracing::info!("Task queue worker pool stopped");
    }

    /// Periodically reap abandoned running tasks and delete expired finished ones.
    async fn maintenance_loop(
        repository: TaskRepository,
        config: TaskQueueConfig,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(config.stale_task_reap_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = repository
                        .reap_stale_running_tasks(config.stale_task_grace_period_secs)
                        .await
                    {
                        tracing::error!(error = %e, "Stale task reaper failed");
                    }
                    if config.retention_days > 0 {
                        if let Err(e) = repository.delete_old_finished_tasks(config.retention_days).await {
                            tracing::error!(error = %e, "Finished task cleanup failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    }

    async fn claim_and_dispatch_one(
        repository: &TaskRepository,
        semaphore: &Arc<Semaphore>,
        context: &Weak<dyn TaskHandlerContext>,
    ) {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("No workers available, skipping claim");
                return;
            }
        };

        match repository.claim_next_task().await {
            Ok(Some(task)) => {
                let repo = repository.clone();
                let ctx = context.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = Self::process_task_with_retry(task, repo, ctx).await {
                        tracing::error!(error = %e, "Task processing failed");
                    }
                });
            }
            Ok(None) => {
                drop(permit);
                tracing::trace!("No tasks available in queue");
            }
            Err(e) => {
                drop(permit);
                tracing::error!(error = %e, "Failed to claim task from queue");
            }
        }
    }

    #[tracing::instrument(skip(repository, context), fields(task.id = %task.id, task.type = %task.task_type))]
    async fn process_task_with_retry(
        task: Task,
        repository: TaskRepository,
        context: Weak<dyn TaskHandlerContext>,
    ) -> Result<()> {
        let ctx = context.upgrade().ok_or_else(|| {
            anyhow::anyhow!("TaskHandlerContext was dropped, cannot process task")
        })?;

        let timeout_duration = task
            .timeout_seconds
            .map(|s| Duration::from_secs(s.max(1) as u64))
            .unwrap_or(Duration::from_secs(3600));

        // Run the handler on its own task so a timeout detaches it instead of dropping it
        let dispatched = task.clone();
        let mut execution = tokio::spawn(async move { ctx.dispatch_task(&dispatched).await });

        let outcome = match tokio::time::timeout(timeout_duration, &mut execution).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(TaskError::unrecoverable(anyhow::anyhow!(
                "Task handler panicked: {}",
                join_err
            ))
            .into()),
            Err(_) => {
                tracing::error!(
                    task_id = %task.id,
                    timeout_seconds = ?task.timeout_seconds,
                    "Task execution timed out, handler left running to completion"
                );
                let error_result = json!({
                    "error": "Task execution timed out",
                    "timeout_seconds": task.timeout_seconds,
                    "detached": true,
                });
                repository
                    .mark_failed(task.id, error_result)
                    .await
                    .context("Failed to mark timed out task as failed")?;
                return Err(anyhow::anyhow!("Task execution timed out"));
            }
        };

        match outcome {
            Ok(task_result) => {
                repository
                    .mark_completed(task.id, task_result)
                    .await
                    .context("Failed to mark task as completed")?;
                tracing::info!(task_id = %task.id, task_type = %task.task_type, "Task completed successfully");
                Ok(())
            }
            Err(e) => {
                let unrecoverable = is_unrecoverable(&e);

                tracing::error!(
                    task_id = %task.id,
                    error = %e,
                    retry_count = task.retry_count,
                    max_retries = task.max_retries,
                    unrecoverable = unrecoverable,
                    "Task execution failed"
                );

                if unrecoverable {
                    let error_result = json!({
                        "error": e.to_string(),
                        "retry_count": task.retry_count,
                        "unrecoverable": true,
                    });
                    repository
                        .mark_failed(task.id, error_result)
                        .await
                        .context("Failed to mark task as failed")?;
                    return Err(e);
                }

                if task.can_retry() {
                    let backoff_seconds = compute_retry_backoff_seconds(task.retry_count);
                    tracing::info!(
                        task_id = %task.id,
                        retry_count = task.retry_count + 1,
                        backoff_seconds = backoff_seconds,
                        "Scheduling task retry"
                    );
                    repository.schedule_retry(task.id, backoff_seconds).await?;
                    Ok(())
                } else {
                    let error_result = json!({
                        "error": e.to_string(),
                        "retry_count": task.retry_count,
                        "reason": "Task failed after maximum retries"
                    });
                    repository
                        .mark_failed(task.id, error_result)
                        .await
                        .context("Failed to mark task as failed")?;
                    tracing::error!(task_id = %task.id, "Task failed after max retries");
                    Err(e)
                }
            }
        }
    }

    /// Stops claiming new tasks and waits until every in-flight task has finished.
    ///
    /// A handler detached by a timeout is not waited for.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating task queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
        let mut stopped = self.stopped_rx.clone();
        let _ = stopped.wait_for(|done| *done).await;
    }
}

impl Clone for TaskQueue {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            config: self.config.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
            stopped_rx: self.stopped_rx.clone(),
        }
    }
}

#[async_trait]
impl Dispatcher for TaskQueue {
    #[tracing::instrument(skip(self, payload))]
    async fn submit_unique(
        &self,
        kind: TaskType,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<DispatchHandle> {
        let (task, created) = self
            .repository
            .submit_unique(
                kind,
                key,
                payload,
                self.config.max_retries,
                Some(self.config.default_timeout_seconds),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    task_type = %kind,
                    dedup_key = %key,
                    "Failed to submit task to repository"
                );
                e
            })?;

        Ok(DispatchHandle {
            task_id: task.id,
            deduplicated: !created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_exponential_then_capped() {
        assert_eq!(compute_retry_backoff_seconds(0), 1);
        assert_eq!(compute_retry_backoff_seconds(1), 2);
        assert_eq!(compute_retry_backoff_seconds(2), 4);
        assert_eq!(compute_retry_backoff_seconds(8), 256);
        assert_eq!(compute_retry_backoff_seconds(9), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(64), MAX_RETRY_BACKOFF_SECS);
        assert_eq!(compute_retry_backoff_seconds(-1), 1);
    }

    #[test]
    fn unrecoverable_task_error_detected() {
        let err: anyhow::Error =
            TaskError::unrecoverable(anyhow::anyhow!("upload fp1 failed: not a resume")).into();
        assert!(is_unrecoverable(&err));
    }

    #[test]
    fn recoverable_task_error_detected() {
        let err: anyhow::Error = TaskError::recoverable(anyhow::anyhow!("pool timed out")).into();
        assert!(!is_unrecoverable(&err));
    }

    #[test]
    fn pipeline_error_recoverability_carries_through() {
        let state_conflict: anyhow::Error = TaskError::from(vitae_core::PipelineError::StateConflict {
            upload_id: "fp1".to_string(),
        })
        .into();
        assert!(is_unrecoverable(&state_conflict));

        let store_down: anyhow::Error =
            TaskError::from(vitae_core::PipelineError::ObjectStore("timeout".to_string())).into();
        assert!(!is_unrecoverable(&store_down));
    }

    #[test]
    fn non_task_error_treated_as_recoverable() {
        let err: anyhow::Error = anyhow::anyhow!("generic error");
        assert!(!is_unrecoverable(&err));
    }

    #[test]
    fn config_defaults_are_usable() {
        let config = TaskQueueConfig::default();
        assert!(config.max_workers > 0);
        assert!(config.default_timeout_seconds > 0);
        assert!(config.retention_days > 0);
    }
}
