//! Discovery scheduler
//!
//! On every tick, lists the uploads eligible for processing and submits one
//! deduplicated task per upload. Ticks never overlap: the next one starts only after
//! the previous one returned. Submitting an upload that already has an outstanding
//! task is a no-op in the dispatcher, so an upload that stays NOT STARTED across
//! several ticks is still processed once.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use vitae_core::models::{ProcessFileUploadPayload, TaskPayload};
use vitae_core::PipelineResult;
use vitae_db::UploadLifecycleStore;

use crate::dispatcher::Dispatcher;

/// Counts from one discovery tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub discovered: usize,
    pub dispatched: usize,
    pub deduplicated: usize,
    pub failed: usize,
}

pub struct DiscoveryScheduler {
    store: Arc<dyn UploadLifecycleStore>,
    dispatcher: Arc<dyn Dispatcher>,
    interval: Duration,
}

impl DiscoveryScheduler {
    pub fn new(
        store: Arc<dyn UploadLifecycleStore>,
        dispatcher: Arc<dyn Dispatcher>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            dispatcher,
            interval,
        }
    }

    /// One discovery pass.
    ///
    /// Fails only when listing fails. A submission error for one upload is logged and
    /// the upload is picked up again on the next tick.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> PipelineResult<TickReport> {
        let uploads = self.store.list_eligible_for_processing().await?;
        let mut report = TickReport {
            discovered: uploads.len(),
            ..Default::default()
        };

        for upload in uploads {
            let payload = ProcessFileUploadPayload {
                file_upload_id: upload.id.clone(),
            };
            let value = serde_json::to_value(&payload)?;

            match self
                .dispatcher
                .submit_unique(ProcessFileUploadPayload::task_type(), &payload.dedup_key(), value)
                .await
            {
                Ok(handle) if handle.deduplicated => report.deduplicated += 1,
                Ok(handle) => {
                    tracing::debug!(
                        upload_id = %upload.id,
                        task_id = %handle.task_id,
                        "Dispatched upload for processing"
                    );
                    report.dispatched += 1;
                }
                Err(e) => {
                    tracing::error!(
                        upload_id = %upload.id,
                        error = %e,
                        "Failed to dispatch upload, will retry next tick"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.discovered > 0 {
            tracing::info!(
                discovered = report.discovered,
                dispatched = report.dispatched,
                deduplicated = report.deduplicated,
                failed = report.failed,
                "Discovery tick finished"
            );
        }

        Ok(report)
    }

    /// Tick until `shutdown` is cancelled. A tick in progress finishes first.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval_secs = self.interval.as_secs_f64(), "Discovery scheduler started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Discovery tick failed");
                    }
                }
            }
        }

        tracing::info!("Discovery scheduler stopped");
    }

    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
