use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use super::errors::{ExtractorError, NavigationError, PublishError, StorageError};
use super::types::{Blob, ClipRecord, ClipRecordDraft};

/// A running upload as handed back by storage.
///
/// `progress` yields fractions in [0, 1] at whatever cadence the backend
/// likes, possibly none at all. `completion` resolves once with the terminal
/// outcome. Cancelling `cancel` asks the backend to abort.
#[derive(Debug)]
pub struct StorageTask {
    pub progress: mpsc::UnboundedReceiver<f64>,
    pub completion: oneshot::Receiver<Result<(), StorageError>>,
    pub cancel: CancellationToken,
}

impl StorageTask {
    /// Creates a task together with the backend's side of it.
    pub fn channel() -> (StorageTaskSender, StorageTask) {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let sender = StorageTaskSender {
            progress: progress_tx,
            completion: Some(completion_tx),
            cancel: cancel.clone(),
        };
        let task = StorageTask {
            progress: progress_rx,
            completion: completion_rx,
            cancel,
        };

        (sender, task)
    }
}

/// Backend side of a [`StorageTask`].
#[derive(Debug)]
pub struct StorageTaskSender {
    progress: mpsc::UnboundedSender<f64>,
    completion: Option<oneshot::Sender<Result<(), StorageError>>>,
    cancel: CancellationToken,
}

impl StorageTaskSender {
    pub fn report(&self, fraction: f64) {
        let _ = self.progress.send(fraction);
    }

    pub fn progress_sender(&self) -> mpsc::UnboundedSender<f64> {
        self.progress.clone()
    }

    /// Sends the terminal outcome. Later calls are ignored.
    pub fn finish(&mut self, result: Result<(), StorageError>) {
        if let Some(completion) = self.completion.take() {
            let _ = completion.send(result);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Starts uploading `blob` under `path`.
    async fn upload(&self, path: &str, blob: Blob) -> Result<StorageTask, StorageError>;

    /// Publicly retrievable URL of a committed object.
    async fn download_url(&self, path: &str) -> Result<String, StorageError>;
}

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn init(&self) -> Result<(), ExtractorError>;

    /// True while an extraction is running.
    fn is_running(&self) -> bool;

    /// Candidate thumbnail frames as URLs, in presentation order.
    async fn get_screenshots(&self, video: &Blob) -> Result<Vec<String>, ExtractorError>;

    async fn blob_from_url(&self, url: &str) -> Result<Blob, ExtractorError>;
}

#[async_trait]
pub trait MetadataPublisher: Send + Sync {
    /// Persists the record, assigning its id and timestamp.
    async fn create_clip(&self, draft: ClipRecordDraft) -> Result<ClipRecord, PublishError>;
}

#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, segments: &[String]) -> Result<(), NavigationError>;
}

/// Services the coordinator talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn BlobStorage>,
    pub publisher: Arc<dyn MetadataPublisher>,
    pub navigator: Arc<dyn Navigator>,
}

impl Collaborators {
    pub fn new(
        storage: Arc<dyn BlobStorage>,
        publisher: Arc<dyn MetadataPublisher>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self { storage, publisher, navigator }
    }
}
