use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;
use crate::core::{
    ClipRecord, ClipRecordDraft, MetadataPublisher, NavigationError, Navigator, PublishError,
};

/// Keeps published clip records in memory, assigning ids and timestamps.
#[derive(Default)]
pub struct MemoryPublisher {
    records: Mutex<Vec<ClipRecord>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<ClipRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl MetadataPublisher for MemoryPublisher {
    async fn create_clip(&self, draft: ClipRecordDraft) -> Result<ClipRecord, PublishError> {
        if draft.title.trim().is_empty() {
            return Err(PublishError::Validation("title is required".to_string()));
        }

        let record = ClipRecord::from_draft(Uuid::new_v4().to_string(), draft, Utc::now());
        self.records.lock().await.push(record.clone());
        info!(id = %record.id, title = %record.draft.title, "clip record created");

        Ok(record)
    }
}

/// Remembers every route it was asked to open.
#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn visited(&self) -> Vec<Vec<String>> {
        self.visited.lock().await.clone()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, segments: &[String]) -> Result<(), NavigationError> {
        if segments.is_empty() {
            return Err(NavigationError::Rejected("empty route".to_string()));
        }

        self.visited.lock().await.push(segments.to_vec());
        Ok(())
    }
}
