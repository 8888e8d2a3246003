use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use vitae_core::models::{
    CandidateRecord, Persona, ProcessingStatus, ProcessingTransition, UploadRecord,
};
use vitae_core::{PipelineError, PipelineResult};
use vitae_db::UploadLifecycleStore;

/// Lifecycle store keeping uploads and candidates in memory.
///
/// Every operation runs its check and its write under one lock, which gives the
/// same exclusivity the row lock gives in Postgres.
#[derive(Default)]
pub struct InMemoryUploadStore {
    uploads: Mutex<HashMap<String, UploadRecord>>,
    candidates: Mutex<Vec<CandidateRecord>>,
    fail_finalize: AtomicBool,
}

impl InMemoryUploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, upload: UploadRecord) {
        self.uploads
            .lock()
            .unwrap()
            .insert(upload.id.clone(), upload);
    }

    pub fn status_of(&self, upload_id: &str) -> Option<ProcessingStatus> {
        self.uploads
            .lock()
            .unwrap()
            .get(upload_id)
            .map(|u| u.processing_status)
    }

    pub fn candidate_count(&self, upload_id: &str) -> usize {
        self.candidates
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.file_upload_id.as_deref() == Some(upload_id))
            .count()
    }

    /// Make the next `mark_completed` roll back.
    pub fn fail_next_finalize(&self) {
        self.fail_finalize.store(true, Ordering::SeqCst);
    }

    fn transition(&self, upload_id: &str, transition: ProcessingTransition) -> PipelineResult<()> {
        let mut uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get_mut(upload_id)
            .ok_or_else(|| PipelineError::NotFound(format!("file upload {}", upload_id)))?;
        if upload.processing_status != transition.from() {
            return Err(PipelineError::StateConflict {
                upload_id: upload_id.to_string(),
            });
        }
        upload.processing_status = transition.to();
        upload.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl UploadLifecycleStore for InMemoryUploadStore {
    async fn list_eligible_for_processing(&self) -> PipelineResult<Vec<UploadRecord>> {
        let mut eligible: Vec<UploadRecord> = self
            .uploads
            .lock()
            .unwrap()
            .values()
            .filter(|u| u.is_eligible_for_processing())
            .cloned()
            .collect();
        eligible.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(eligible)
    }

    async fn claim_for_processing(&self, upload_id: &str) -> PipelineResult<UploadRecord> {
        let mut uploads = self.uploads.lock().unwrap();
        let upload = uploads
            .get_mut(upload_id)
            .ok_or_else(|| PipelineError::NotFound(format!("file upload {}", upload_id)))?;
        if !upload.is_eligible_for_processing() {
            return Err(PipelineError::StateConflict {
                upload_id: upload_id.to_string(),
            });
        }
        upload.processing_status = ProcessingTransition::CLAIM.to();
        Ok(upload.clone())
    }

    async fn mark_completed(
        &self,
        upload: &UploadRecord,
        persona: &Persona,
    ) -> PipelineResult<CandidateRecord> {
        if self.fail_finalize.swap(false, Ordering::SeqCst) {
            return Err(PipelineError::Internal {
                message: "finalize transaction rolled back".to_string(),
                source: anyhow::anyhow!("injected failure"),
            });
        }

        self.transition(&upload.id, ProcessingTransition::COMPLETE)?;

        let now = Utc::now();
        let candidate = CandidateRecord {
            id: format!("cand-{}", upload.id),
            team_id: upload.team_id.clone(),
            file_upload_id: Some(upload.id.clone()),
            ai_generated_persona: Some(persona.clone()),
            manually_created_persona: None,
            created_at: now,
            updated_at: now,
        };
        self.candidates.lock().unwrap().push(candidate.clone());
        Ok(candidate)
    }

    async fn mark_failed(&self, upload_id: &str) -> PipelineResult<()> {
        self.transition(upload_id, ProcessingTransition::FAIL)
    }
}

/// Listing-only store that hands out a fixed sequence of listings, one per call.
///
/// A `None` entry makes that call fail the way a dropped database connection would.
pub struct ScriptedListingStore {
    listings: Mutex<VecDeque<Option<Vec<UploadRecord>>>>,
    list_calls: AtomicUsize,
}

impl ScriptedListingStore {
    pub fn new(batches: Vec<Vec<UploadRecord>>) -> Self {
        Self::scripted(batches.into_iter().map(Some).collect())
    }

    pub fn scripted(listings: Vec<Option<Vec<UploadRecord>>>) -> Self {
        Self {
            listings: Mutex::new(listings.into()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadLifecycleStore for ScriptedListingStore {
    async fn list_eligible_for_processing(&self) -> PipelineResult<Vec<UploadRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match self.listings.lock().unwrap().pop_front() {
            Some(Some(batch)) => Ok(batch),
            Some(None) => Err(PipelineError::Database(sqlx::Error::PoolTimedOut)),
            None => Ok(Vec::new()),
        }
    }

    async fn claim_for_processing(&self, upload_id: &str) -> PipelineResult<UploadRecord> {
        Err(PipelineError::StateConflict {
            upload_id: upload_id.to_string(),
        })
    }

    async fn mark_completed(
        &self,
        upload: &UploadRecord,
        _persona: &Persona,
    ) -> PipelineResult<CandidateRecord> {
        Err(PipelineError::StateConflict {
            upload_id: upload.id.clone(),
        })
    }

    async fn mark_failed(&self, upload_id: &str) -> PipelineResult<()> {
        Err(PipelineError::StateConflict {
            upload_id: upload_id.to_string(),
        })
    }
}
