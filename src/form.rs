//! Upload form state: staging, title validation, submit and retry.

use thiserror::Error;
use tracing::{info, warn};
use crate::core::{
    CoordinatorStatus, FileCandidate, Owner, SessionPhase, SessionSnapshot, Submission,
    UploadCoordinator, UploadError,
};
use crate::stager::{MediaStager, StageOutcome, StagedMedia};

pub const DEFAULT_MIN_TITLE_LEN: usize = 3;

#[derive(Error, Debug)]
pub enum FormError {
    #[error("Title is required")]
    TitleRequired,

    #[error("Title must be at least {min} characters")]
    TitleTooShort { min: usize },

    #[error("No video has been staged")]
    NothingStaged,

    #[error("You must be signed in to upload")]
    NotSignedIn,

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Ties the stager to the coordinator.
///
/// Staged media survives a failed upload, so a retry only needs another
/// `submit`.
pub struct UploadForm {
    stager: MediaStager,
    coordinator: UploadCoordinator,
    owner: Option<Owner>,
    min_title_len: usize,
}

impl UploadForm {
    /// Creates the form and initialises the frame extractor.
    pub async fn new(stager: MediaStager, coordinator: UploadCoordinator, min_title_len: usize) -> Result<Self, FormError> {
        stager.init().await?;

        Ok(Self {
            stager,
            coordinator,
            owner: None,
            min_title_len,
        })
    }

    pub fn set_owner(&mut self, owner: Option<Owner>) {
        self.owner = owner;
    }

    pub async fn stage(&mut self, candidate: FileCandidate) -> Result<StageOutcome, FormError> {
        let outcome = self.stager.stage(candidate).await?;
        Ok(outcome)
    }

    pub fn staged(&self) -> Option<&StagedMedia> {
        self.stager.staged()
    }

    /// True once a video is staged and the details step can be shown.
    pub fn next_step(&self) -> bool {
        self.stager.staged().is_some()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.stager.set_title(title);
    }

    pub fn select_screenshot(&mut self, index: usize) -> bool {
        self.stager.select_screenshot(index)
    }

    pub fn validate_title(&self) -> Result<String, FormError> {
        let staged = self.stager.staged().ok_or(FormError::NothingStaged)?;
        let title = staged.title.trim();

        if title.is_empty() {
            return Err(FormError::TitleRequired);
        }
        if title.chars().count() < self.min_title_len {
            return Err(FormError::TitleTooShort { min: self.min_title_len });
        }

        Ok(title.to_string())
    }

    /// Fetches the selected thumbnail and hands both files to the coordinator.
    pub async fn submit(&mut self) -> Result<SessionSnapshot, FormError> {
        let title = self.validate_title()?;
        let owner = self.owner.clone().ok_or(FormError::NotSignedIn)?;
        let video = self.stager
            .staged()
            .map(|staged| staged.video.clone())
            .ok_or(FormError::NothingStaged)?;
        let thumbnail = self.stager.thumbnail_blob().await?;

        let result = self.coordinator
            .begin(Submission { video, thumbnail, title, owner })
            .await;

        match &result {
            Ok(snapshot) => info!(token = %snapshot.token, "submitted clip"),
            Err(err) => warn!(error = %err, "submit refused"),
        }

        Ok(result?)
    }

    pub async fn cancel(&self) -> Result<bool, FormError> {
        Ok(self.coordinator.cancel().await?)
    }

    pub async fn status(&self) -> Result<CoordinatorStatus, FormError> {
        Ok(self.coordinator.status().await?)
    }

    /// Form-level phase: `Staging` while media waits for submit.
    pub async fn phase(&self) -> Result<SessionPhase, FormError> {
        let phase = self.coordinator.status().await?.phase;
        if phase == SessionPhase::Idle && self.next_step() {
            return Ok(SessionPhase::Staging);
        }

        Ok(phase)
    }

    /// Inputs are locked while uploading, publishing, and after success.
    pub async fn is_editable(&self) -> Result<bool, FormError> {
        let phase = self.coordinator.status().await?.phase;
        Ok(matches!(phase, SessionPhase::Idle | SessionPhase::Failed))
    }
}
