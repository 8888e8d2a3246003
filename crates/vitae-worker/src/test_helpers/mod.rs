//! In-memory collaborators for exercising the scheduler, pipeline and handler
//! without Postgres, an object store or a completion provider.

mod fakes;
mod store;

pub use fakes::{CannedCompletion, MemoryStorage, RecordingDispatcher, StaticExtractor};
pub use store::{InMemoryUploadStore, ScriptedListingStore};

use std::sync::Arc;

use chrono::Utc;
use vitae_core::models::{ProcessingStatus, UploadRecord, UploadStatus};
use vitae_services::PersonaBuilder;

use crate::pipeline::{PipelineDeps, ResumePipeline};

/// A transferred, unclaimed upload.
pub fn eligible_upload(id: &str, team_id: &str) -> UploadRecord {
    let now = Utc::now();
    UploadRecord {
        id: id.to_string(),
        name: "resume.pdf".to_string(),
        object_location: format!("{}/{}/resume.pdf", team_id, id),
        upload_status: UploadStatus::Success,
        processing_status: ProcessingStatus::NotStarted,
        team_id: team_id.to_string(),
        created_at: now,
        updated_at: now,
    }
}

pub fn pipeline_with(
    store: Arc<InMemoryUploadStore>,
    storage: MemoryStorage,
    extractor: StaticExtractor,
    completion: CannedCompletion,
) -> ResumePipeline {
    ResumePipeline::new(PipelineDeps {
        store,
        storage: Arc::new(storage),
        extractor: Arc::new(extractor),
        persona_builder: PersonaBuilder::new(Arc::new(completion)),
    })
}
