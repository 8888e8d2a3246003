//! Durable dispatcher queue against a real Postgres.
//!
//! Run with: `cargo test -p vitae-db --test task_queue_test -- --ignored`
//! Requires Docker for testcontainers (Postgres).

mod helpers;

use helpers::setup_test_db;
use serde_json::json;
use vitae_core::models::{TaskStatus, TaskType};
use vitae_db::TaskRepository;

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_submit_unique_coalesces_outstanding_task() {
    let db = setup_test_db().await;
    let tasks = TaskRepository::new(db.pool.clone());

    let (first, created) = tasks
        .submit_unique(
            TaskType::ProcessFileUpload,
            "fp1",
            json!({ "fileUploadId": "fp1" }),
            3,
            Some(600),
        )
        .await
        .unwrap();
    assert!(created);
    assert_eq!(first.status, TaskStatus::Pending);
    assert_eq!(first.dedup_key.as_deref(), Some("fp1"));

    let (second, created) = tasks
        .submit_unique(
            TaskType::ProcessFileUpload,
            "fp1",
            json!({ "fileUploadId": "fp1" }),
            3,
            Some(600),
        )
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);

    let (other, created) = tasks
        .submit_unique(
            TaskType::ProcessFileUpload,
            "fp2",
            json!({ "fileUploadId": "fp2" }),
            3,
            Some(600),
        )
        .await
        .unwrap();
    assert!(created);
    assert_ne!(other.id, first.id);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_running_task_still_coalesces_and_finished_task_does_not() {
    let db = setup_test_db().await;
    let tasks = TaskRepository::new(db.pool.clone());

    let (submitted, _) = tasks
        .submit_unique(TaskType::ProcessFileUpload, "fp1", json!({ "fileUploadId": "fp1" }), 3, None)
        .await
        .unwrap();

    let claimed = tasks.claim_next_task().await.unwrap().unwrap();
    assert_eq!(claimed.id, submitted.id);
    assert_eq!(claimed.status, TaskStatus::Running);
    assert!(claimed.started_at.is_some());

    let (while_running, created) = tasks
        .submit_unique(TaskType::ProcessFileUpload, "fp1", json!({ "fileUploadId": "fp1" }), 3, None)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(while_running.id, submitted.id);

    tasks
        .mark_completed(submitted.id, json!({ "candidateId": "c1" }))
        .await
        .unwrap();

    let (after_completion, created) = tasks
        .submit_unique(TaskType::ProcessFileUpload, "fp1", json!({ "fileUploadId": "fp1" }), 3, None)
        .await
        .unwrap();
    assert!(created);
    assert_ne!(after_completion.id, submitted.id);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_claim_order_and_empty_queue() {
    let db = setup_test_db().await;
    let tasks = TaskRepository::new(db.pool.clone());

    assert!(tasks.claim_next_task().await.unwrap().is_none());

    for key in ["fp1", "fp2", "fp3"] {
        tasks
            .submit_unique(TaskType::ProcessFileUpload, key, json!({ "fileUploadId": key }), 3, None)
            .await
            .unwrap();
    }

    let mut claimed = Vec::new();
    while let Some(task) = tasks.claim_next_task().await.unwrap() {
        claimed.push(task.dedup_key.unwrap());
    }
    assert_eq!(claimed, vec!["fp1", "fp2", "fp3"]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_scheduled_retry_is_not_claimable_before_backoff() {
    let db = setup_test_db().await;
    let tasks = TaskRepository::new(db.pool.clone());

    let (submitted, _) = tasks
        .submit_unique(TaskType::ProcessFileUpload, "fp1", json!({ "fileUploadId": "fp1" }), 3, None)
        .await
        .unwrap();
    tasks.claim_next_task().await.unwrap().unwrap();

    let retried = tasks.schedule_retry(submitted.id, 300).await.unwrap();
    assert_eq!(retried.status, TaskStatus::Scheduled);
    assert_eq!(retried.retry_count, 1);
    assert!(retried.started_at.is_none());

    assert!(tasks.claim_next_task().await.unwrap().is_none());

    let immediate = tasks.schedule_retry(submitted.id, 0).await.unwrap();
    assert_eq!(immediate.retry_count, 2);
    let reclaimed = tasks.claim_next_task().await.unwrap().unwrap();
    assert_eq!(reclaimed.id, submitted.id);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reaper_reschedules_abandoned_running_task() {
    let db = setup_test_db().await;
    let tasks = TaskRepository::new(db.pool.clone());

    let (submitted, _) = tasks
        .submit_unique(TaskType::ProcessFileUpload, "fp1", json!({ "fileUploadId": "fp1" }), 1, Some(1))
        .await
        .unwrap();
    tasks.claim_next_task().await.unwrap().unwrap();

    sqlx::query("UPDATE tasks SET started_at = NOW() - interval '1 hour' WHERE id = $1")
        .bind(submitted.id)
        .execute(&db.pool)
        .await
        .unwrap();

    assert_eq!(tasks.reap_stale_running_tasks(60).await.unwrap(), 1);
    let reaped = tasks.get_task(submitted.id).await.unwrap().unwrap();
    assert_eq!(reaped.status, TaskStatus::Pending);
    assert_eq!(reaped.retry_count, 1);

    // Out of retries the second time round
    tasks.claim_next_task().await.unwrap().unwrap();
    sqlx::query("UPDATE tasks SET started_at = NOW() - interval '1 hour' WHERE id = $1")
        .bind(submitted.id)
        .execute(&db.pool)
        .await
        .unwrap();
    assert_eq!(tasks.reap_stale_running_tasks(60).await.unwrap(), 1);
    let failed = tasks.get_task(submitted.id).await.unwrap().unwrap();
    assert_eq!(failed.status, TaskStatus::Failed);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_delete_old_finished_tasks_keeps_recent_and_outstanding() {
    let db = setup_test_db().await;
    let tasks = TaskRepository::new(db.pool.clone());

    let (old, _) = tasks
        .submit_unique(TaskType::ProcessFileUpload, "fp1", json!({ "fileUploadId": "fp1" }), 3, None)
        .await
        .unwrap();
    tasks.mark_failed(old.id, json!({ "error": "boom" })).await.unwrap();
    sqlx::query("UPDATE tasks SET completed_at = NOW() - interval '30 days' WHERE id = $1")
        .bind(old.id)
        .execute(&db.pool)
        .await
        .unwrap();

    let (recent, _) = tasks
        .submit_unique(TaskType::ProcessFileUpload, "fp2", json!({ "fileUploadId": "fp2" }), 3, None)
        .await
        .unwrap();
    tasks.mark_completed(recent.id, json!({})).await.unwrap();

    let (outstanding, _) = tasks
        .submit_unique(TaskType::ProcessFileUpload, "fp3", json!({ "fileUploadId": "fp3" }), 3, None)
        .await
        .unwrap();

    assert_eq!(tasks.delete_old_finished_tasks(7).await.unwrap(), 1);
    assert!(tasks.get_task(old.id).await.unwrap().is_none());
    assert!(tasks.get_task(recent.id).await.unwrap().is_some());
    assert!(tasks.get_task(outstanding.id).await.unwrap().is_some());
}
