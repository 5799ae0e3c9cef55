use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;
use crate::core::{Blob, BlobStorage, StorageError, StorageTask};
use super::progress_stream::ProgressStream;

pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Blob storage held in process memory.
///
/// Uploads are streamed in chunks so progress is reported the way a network
/// backend would; objects become visible only once fully written.
#[derive(Clone)]
pub struct MemoryStorage {
    base_url: Url,
    chunk_size: usize,
    chunk_delay: Duration,
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryStorage {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_delay: Duration::ZERO,
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Simulated transfer time per chunk.
    pub fn with_chunk_delay(mut self, chunk_delay: Duration) -> Self {
        self.chunk_delay = chunk_delay;
        self
    }

    pub async fn object(&self, path: &str) -> Option<Bytes> {
        self.objects.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    fn chunks(&self, data: &Bytes) -> Vec<std::io::Result<Bytes>> {
        (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| Ok(data.slice(start..(start + self.chunk_size).min(data.len()))))
            .collect()
    }
}

#[async_trait]
impl BlobStorage for MemoryStorage {
    async fn upload(&self, path: &str, blob: Blob) -> Result<StorageTask, StorageError> {
        if path.is_empty() || path.starts_with('/') || path.contains("..") {
            return Err(StorageError::Rejected(format!("invalid key {:?}", path)));
        }

        let (mut sender, task) = StorageTask::channel();
        let mut stream = ProgressStream::new(
            futures::stream::iter(self.chunks(&blob.data)),
            blob.len() as u64,
            sender.progress_sender(),
        );
        let objects = self.objects.clone();
        let chunk_delay = self.chunk_delay;
        let path = path.to_string();

        tokio::spawn(async move {
            let mut buffer = BytesMut::with_capacity(blob.len());

            loop {
                tokio::select! {
                    _ = sender.cancelled() => {
                        debug!(%path, "upload cancelled");
                        sender.finish(Err(StorageError::Cancelled));
                        return;
                    }
                    _ = tokio::time::sleep(chunk_delay) => {}
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(err)) => {
                        sender.finish(Err(StorageError::transport(err.to_string())));
                        return;
                    }
                    None => break,
                }
            }

            objects.write().await.insert(path.clone(), buffer.freeze());
            info!(%path, bytes = blob.len(), "object stored");
            sender.finish(Ok(()));
        });

        Ok(task)
    }

    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        if !self.objects.read().await.contains_key(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let url = self.base_url
            .join(path)
            .map_err(|err| StorageError::InvalidUrl(err.to_string()))?;

        Ok(url.to_string())
    }
}
