#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, Notify};
use clipdrop::core::{
    Blob, BlobStorage, ClipRecord, ClipRecordDraft, CoordinatorEvent, MetadataPublisher, Owner,
    PublishError, StorageError, StorageTask, StorageTaskSender, Submission,
};

pub const WAIT: Duration = Duration::from_secs(5);

/// Storage whose uploads only progress when the test says so.
#[derive(Default)]
pub struct ScriptedStorage {
    senders: Mutex<HashMap<String, StorageTaskSender>>,
    uploads: Mutex<Vec<String>>,
    unresolvable: Mutex<HashSet<String>>,
    reject_uploads: AtomicBool,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, path: &str, fraction: f64) {
        if let Some(sender) = self.senders.lock().unwrap().get(path) {
            sender.report(fraction);
        }
    }

    pub fn finish(&self, path: &str, result: Result<(), StorageError>) {
        if let Some(sender) = self.senders.lock().unwrap().get_mut(path) {
            sender.finish(result);
        }
    }

    pub fn is_cancelled(&self, path: &str) -> bool {
        self.senders
            .lock()
            .unwrap()
            .get(path)
            .map(|sender| sender.is_cancelled())
            .unwrap_or(false)
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    /// Makes `download_url` fail for `path`.
    pub fn make_unresolvable(&self, path: &str) {
        self.unresolvable.lock().unwrap().insert(path.to_string());
    }

    pub fn reject_uploads(&self) {
        self.reject_uploads.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStorage for ScriptedStorage {
    async fn upload(&self, path: &str, _blob: Blob) -> Result<StorageTask, StorageError> {
        self.uploads.lock().unwrap().push(path.to_string());
        if self.reject_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected("quota exceeded".to_string()));
        }

        let (sender, task) = StorageTask::channel();
        self.senders.lock().unwrap().insert(path.to_string(), sender);
        Ok(task)
    }

    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        if self.unresolvable.lock().unwrap().contains(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        Ok(format!("https://cdn.test/{}", path))
    }
}

/// Publisher that counts calls and can be held open or told to fail once.
#[derive(Default)]
pub struct GatedPublisher {
    calls: AtomicUsize,
    gated: AtomicBool,
    fail_next: AtomicBool,
    release: Notify,
}

impl GatedPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        let publisher = Self::default();
        publisher.gated.store(true, Ordering::SeqCst);
        publisher
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl MetadataPublisher for GatedPublisher {
    async fn create_clip(&self, draft: ClipRecordDraft) -> Result<ClipRecord, PublishError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PublishError::Transient("backend unavailable".to_string()));
        }
        if self.gated.load(Ordering::SeqCst) {
            self.release.notified().await;
        }

        Ok(ClipRecord::from_draft(format!("clip-{}", call), draft, Utc::now()))
    }
}

pub fn submission(title: &str) -> Submission {
    Submission {
        video: Blob::new("clip.mp4", "video/mp4", vec![0u8; 1024]),
        thumbnail: Blob::new("frame.png", "image/png", vec![1u8; 64]),
        title: title.to_string(),
        owner: Owner::new("uid-1", "Ada"),
    }
}

/// Waits for the next event accepted by `matches`, skipping the rest.
pub async fn next_event<F>(events: &mut broadcast::Receiver<CoordinatorEvent>, matches: F) -> CoordinatorEvent
where
    F: Fn(&CoordinatorEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event stream closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

pub async fn next_progress(events: &mut broadcast::Receiver<CoordinatorEvent>) -> f64 {
    match next_event(events, |event| matches!(event, CoordinatorEvent::Progress { .. })).await {
        CoordinatorEvent::Progress { fraction, .. } => fraction,
        _ => unreachable!(),
    }
}

/// Everything already sitting in the receiver.
pub fn drain(events: &mut broadcast::Receiver<CoordinatorEvent>) -> Vec<CoordinatorEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

pub async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true")
}

/// Lets spawned tasks run to quiescence.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {}, got {}", expected, actual);
}
