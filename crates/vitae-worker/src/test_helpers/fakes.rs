use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;
use vitae_core::models::TaskType;
use vitae_core::{PipelineError, StorageBackend};
use vitae_services::{ChatMessage, CompletionClient, TextExtractor};
use vitae_storage::{object_key, Storage, StorageError, StorageResult};

use crate::dispatcher::{DispatchHandle, Dispatcher};

/// Object store backed by a map of object keys.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_file(team_id: &str, upload_id: &str, file_name: &str) -> Self {
        let storage = Self::default();
        let key = object_key(team_id, upload_id, file_name).unwrap();
        storage
            .objects
            .lock()
            .unwrap()
            .insert(key, Bytes::from_static(b"%PDF-1.4 test resume"));
        storage
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn fetch_bytes(
        &self,
        team_id: &str,
        upload_id: &str,
        file_name: &str,
    ) -> StorageResult<Bytes> {
        let key = object_key(team_id, upload_id, file_name)?;
        self.objects
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or(StorageError::NotFound(key))
    }

    async fn put_bytes(
        &self,
        team_id: &str,
        upload_id: &str,
        file_name: &str,
        data: Bytes,
    ) -> StorageResult<String> {
        let key = object_key(team_id, upload_id, file_name)?;
        self.objects.lock().unwrap().insert(key.clone(), data);
        Ok(key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Extractor returning a fixed text, or failing every call.
pub struct StaticExtractor {
    text: Option<String>,
}

impl StaticExtractor {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl TextExtractor for StaticExtractor {
    async fn extract_text(&self, _data: Bytes) -> Result<String, PipelineError> {
        self.text
            .clone()
            .ok_or_else(|| PipelineError::Extraction("document contains no extractable text".to_string()))
    }
}

/// Completion client replying with the same text to every conversation.
#[derive(Clone)]
pub struct CannedCompletion {
    reply: String,
    calls: Arc<AtomicUsize>,
}

impl CannedCompletion {
    pub fn reply(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for CannedCompletion {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Dispatcher that records submissions and coalesces on outstanding keys.
#[derive(Default)]
pub struct RecordingDispatcher {
    submitted: Mutex<Vec<(TaskType, String)>>,
    outstanding: Mutex<HashSet<String>>,
    fail_keys: Mutex<HashSet<String>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of every submission that created a new unit, in order.
    pub fn dispatched_keys(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn dispatched_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    /// Reject every submission for `key`.
    pub fn fail_on(&self, key: &str) {
        self.fail_keys.lock().unwrap().insert(key.to_string());
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn submit_unique(
        &self,
        kind: TaskType,
        key: &str,
        payload: serde_json::Value,
    ) -> Result<DispatchHandle> {
        if self.fail_keys.lock().unwrap().contains(key) {
            anyhow::bail!("queue unavailable for {}", key);
        }
        assert_eq!(payload["fileUploadId"], key);

        let created = self.outstanding.lock().unwrap().insert(key.to_string());
        if created {
            self.submitted.lock().unwrap().push((kind, key.to_string()));
        }
        Ok(DispatchHandle {
            task_id: Uuid::new_v4(),
            deduplicated: !created,
        })
    }
}
