//! Pipeline collaborators and background services

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use vitae_core::Config;
use vitae_db::{PgUploadLifecycle, TaskRepository, UploadLifecycleStore};
use vitae_services::{OpenAiClient, PdfTextExtractor, PersonaBuilder};
use vitae_storage::create_storage;
use vitae_worker::{
    DiscoveryScheduler, PipelineDeps, ResumePipeline, TaskQueue, TaskQueueConfig,
    UploadTaskContext,
};

/// Everything the processor keeps alive while it runs.
pub struct Services {
    pub context: Arc<UploadTaskContext>,
    pub queue: Arc<TaskQueue>,
    pub scheduler: Arc<DiscoveryScheduler>,
}

pub async fn initialize_services(config: &Config, pool: PgPool) -> Result<Services> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize object store")?;
    tracing::info!(backend = %storage.backend_type(), "Object store initialized");

    let completion = OpenAiClient::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
        config.openai_model.clone(),
        config.openai_max_tokens,
        Duration::from_secs(config.openai_timeout_secs),
    )?;
    tracing::info!(model = %config.openai_model, "Completion client initialized");

    let store: Arc<dyn UploadLifecycleStore> = Arc::new(PgUploadLifecycle::new(pool.clone()));

    let pipeline = ResumePipeline::new(PipelineDeps {
        store: store.clone(),
        storage,
        extractor: Arc::new(PdfTextExtractor::new()),
        persona_builder: PersonaBuilder::new(Arc::new(completion)),
    });

    let context = Arc::new(UploadTaskContext::new(pipeline));
    // The queue only holds a weak reference; `Services` owns the context.
    let weak_context = context.downgrade();

    let queue_config = TaskQueueConfig::from_config(config);
    tracing::info!(
        max_workers = queue_config.max_workers,
        max_retries = queue_config.max_retries,
        "Starting task queue"
    );
    let queue = Arc::new(TaskQueue::new(
        TaskRepository::new(pool.clone()),
        queue_config,
        weak_context,
        Some(pool),
    ));

    let scheduler = Arc::new(DiscoveryScheduler::new(
        store,
        queue.clone(),
        Duration::from_secs(config.scheduler_interval_secs),
    ));

    Ok(Services {
        context,
        queue,
        scheduler,
    })
}
