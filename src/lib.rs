//! Video + thumbnail upload orchestration.
//!
//! [`UploadCoordinator`] runs one session at a time: it uploads a video and
//! its thumbnail side by side, folds their progress into one fraction, waits
//! for both to commit, and only then resolves URLs and writes the clip record.

pub mod config;
pub mod core;
pub mod form;
pub mod memory;
pub mod stager;

// Re-export the core types
pub use crate::core::{
    BlobStorage,
    ClipRecord,
    ClipRecordDraft,
    Collaborators,
    CoordinatorConfig,
    CoordinatorEvent,
    CoordinatorStatus,
    FileCandidate,
    FrameExtractor,
    MetadataPublisher,
    Navigator,
    Owner,
    Result,
    SessionPhase,
    SessionSnapshot,
    Submission,
    UploadCoordinator,
    UploadCoordinatorHandle,
    UploadError,
};

pub use form::{FormError, UploadForm};
pub use stager::{MediaStager, StageOutcome};
