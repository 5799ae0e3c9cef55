//! Validates a picked file and prepares the thumbnail candidates for it.

use std::sync::Arc;
use tracing::{debug, info};
use crate::core::{Blob, FileCandidate, FrameExtractor, Result, UploadError};

pub const MP4_CONTENT_TYPE: &str = "video/mp4";

#[derive(Debug, Clone)]
pub struct StagerConfig {
    pub accepted_content_type: String,
}

impl Default for StagerConfig {
    fn default() -> Self {
        Self {
            accepted_content_type: MP4_CONTENT_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Wrong container type or unreadable file
    InvalidInput(String),
    /// A previous extraction is still running
    ExtractorBusy,
    NoFrames,
}

/// Result of a staging attempt. Rejections leave the stager untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Staged,
    Rejected(RejectReason),
}

#[derive(Debug, Clone)]
pub struct StagedMedia {
    pub video: Blob,
    pub title: String,
    pub screenshots: Vec<String>,
    pub selected: usize,
}

impl StagedMedia {
    pub fn selected_screenshot(&self) -> &str {
        &self.screenshots[self.selected]
    }
}

pub struct MediaStager {
    extractor: Arc<dyn FrameExtractor>,
    config: StagerConfig,
    staged: Option<StagedMedia>,
}

impl MediaStager {
    pub fn new(extractor: Arc<dyn FrameExtractor>, config: StagerConfig) -> Self {
        Self {
            extractor,
            config,
            staged: None,
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.extractor.init().await?;
        Ok(())
    }

    /// Stages `candidate` as the video to upload.
    ///
    /// Attempts made while the extractor is busy are dropped, not queued.
    /// Extraction errors propagate and also leave the current staging as is.
    pub async fn stage(&mut self, candidate: FileCandidate) -> Result<StageOutcome> {
        if self.extractor.is_running() {
            debug!(file = %candidate.name, "extractor busy, ignoring file");
            return Ok(StageOutcome::Rejected(RejectReason::ExtractorBusy));
        }

        let Some(data) = candidate.data else {
            debug!(file = %candidate.name, "file unavailable");
            return Ok(StageOutcome::Rejected(RejectReason::InvalidInput(
                format!("{} could not be read", candidate.name),
            )));
        };

        if candidate.content_type != self.config.accepted_content_type {
            debug!(file = %candidate.name, content_type = %candidate.content_type, "unsupported file type");
            return Ok(StageOutcome::Rejected(RejectReason::InvalidInput(
                format!("unsupported content type {}", candidate.content_type),
            )));
        }

        let video = Blob::new(candidate.name, candidate.content_type, data);
        let screenshots = self.extractor.get_screenshots(&video).await?;
        if screenshots.is_empty() {
            return Ok(StageOutcome::Rejected(RejectReason::NoFrames));
        }

        let title = default_title(&video.name);
        info!(file = %video.name, frames = screenshots.len(), "staged video");

        self.staged = Some(StagedMedia {
            video,
            title,
            screenshots,
            selected: 0,
        });

        Ok(StageOutcome::Staged)
    }

    pub fn staged(&self) -> Option<&StagedMedia> {
        self.staged.as_ref()
    }

    /// Picks another candidate frame. Returns `false` when `index` is out of
    /// range or nothing is staged.
    pub fn select_screenshot(&mut self, index: usize) -> bool {
        match self.staged.as_mut() {
            Some(staged) if index < staged.screenshots.len() => {
                staged.selected = index;
                true
            }
            _ => false,
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        if let Some(staged) = self.staged.as_mut() {
            staged.title = title.into();
        }
    }

    /// Fetches the selected frame as an uploadable blob.
    pub async fn thumbnail_blob(&self) -> Result<Blob> {
        let staged = self.staged
            .as_ref()
            .ok_or_else(|| UploadError::invalid_input("no video staged"))?;

        let blob = self.extractor.blob_from_url(staged.selected_screenshot()).await?;
        Ok(blob)
    }

    pub fn reset(&mut self) {
        self.staged = None;
    }
}

/// Drops the last extension from a file name: `clip.mp4` becomes `clip`.
pub fn default_title(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() && !file_name[dot..].contains('/') => {
            file_name[..dot].to_string()
        }
        _ => file_name.to_string(),
    }
}
