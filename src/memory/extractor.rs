use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;
use url::Url;
use crate::core::{Blob, ExtractorError, FrameExtractor};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
const PNG_CONTENT_TYPE: &str = "image/png";

/// Frame extractor that fabricates placeholder PNG frames and hands them out
/// as `data:` URLs.
pub struct MemoryFrameExtractor {
    frame_count: usize,
    initialized: AtomicBool,
    running: AtomicBool,
}

impl MemoryFrameExtractor {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame_count,
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    fn frame(video: &Blob, index: usize) -> Vec<u8> {
        let mut frame = PNG_SIGNATURE.to_vec();
        frame.extend_from_slice(format!("{}#{}", video.name, index).as_bytes());
        frame
    }
}

impl Default for MemoryFrameExtractor {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Clears the running flag when an extraction ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl FrameExtractor for MemoryFrameExtractor {
    async fn init(&self) -> Result<(), ExtractorError> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn get_screenshots(&self, video: &Blob) -> Result<Vec<String>, ExtractorError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(ExtractorError::NotInitialized);
        }
        if video.is_empty() {
            return Err(ExtractorError::Extraction(format!("{} has no frames", video.name)));
        }

        self.running.store(true, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);
        tokio::task::yield_now().await;

        let urls = (0..self.frame_count)
            .map(|index| format!("data:{};base64,{}", PNG_CONTENT_TYPE, STANDARD.encode(Self::frame(video, index))))
            .collect::<Vec<_>>();
        debug!(video = %video.name, frames = urls.len(), "extracted frames");

        Ok(urls)
    }

    async fn blob_from_url(&self, url: &str) -> Result<Blob, ExtractorError> {
        let parsed = Url::parse(url).map_err(|err| ExtractorError::InvalidUrl(err.to_string()))?;
        if parsed.scheme() != "data" {
            return Err(ExtractorError::InvalidUrl(format!("unsupported scheme {}", parsed.scheme())));
        }

        let (media_type, payload) = parsed
            .path()
            .split_once(',')
            .ok_or_else(|| ExtractorError::InvalidUrl("missing data separator".to_string()))?;
        let content_type = media_type
            .strip_suffix(";base64")
            .ok_or_else(|| ExtractorError::InvalidUrl("only base64 payloads are supported".to_string()))?;
        let data = STANDARD
            .decode(payload)
            .map_err(|err| ExtractorError::InvalidUrl(err.to_string()))?;

        Ok(Blob::new("screenshot.png", content_type, data))
    }
}
