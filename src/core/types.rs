use std::fmt;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;
use super::errors::Result;
use super::paths::RemotePaths;

/// Identifies one submission. Effects carrying a token other than the
/// coordinator's active one are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct SessionToken(Uuid);

impl SessionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum UploadKind {
    Video,
    Thumbnail,
}

impl UploadKind {
    pub fn sibling(self) -> Self {
        match self {
            UploadKind::Video => UploadKind::Thumbnail,
            UploadKind::Thumbnail => UploadKind::Video,
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadKind::Video => f.write_str("video"),
            UploadKind::Thumbnail => f.write_str("thumbnail"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum TaskState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum BarrierState {
    /// At least one upload has not reported yet
    Waiting,
    /// Both uploads succeeded
    Satisfied,
    /// One upload failed; the sibling's outcome no longer matters
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum SessionPhase {
    Idle,
    /// Media is staged and waiting for submit
    Staging,
    Uploading,
    /// Both uploads committed; resolving URLs and writing the record
    Publishing,
    Succeeded,
    Failed,
}

impl SessionPhase {
    /// Whether a session in this phase blocks a new submission.
    pub fn is_busy(self) -> bool {
        matches!(self, SessionPhase::Uploading | SessionPhase::Publishing)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadTask {
    pub kind: UploadKind,
    pub progress: f64,
    pub state: TaskState,
    pub remote: String,
}

impl UploadTask {
    pub fn new(kind: UploadKind, remote: impl Into<String>) -> Self {
        Self {
            kind,
            progress: 0.0,
            state: TaskState::Pending,
            remote: remote.into(),
        }
    }
}

/// In-memory file contents handed to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl Blob {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A file the user picked or dropped. `data` is `None` when the file could
/// not be read.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub content_type: String,
    pub data: Option<Bytes>,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: Some(data.into()),
        }
    }

    pub fn unavailable(name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Owner {
    pub uid: String,
    pub display_name: String,
}

impl Owner {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: display_name.into(),
        }
    }
}

/// Everything the coordinator needs to start a session.
#[derive(Debug, Clone)]
pub struct Submission {
    pub video: Blob,
    pub thumbnail: Blob,
    pub title: String,
    pub owner: Owner,
}

/// Clip metadata before the publisher assigns an id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClipRecordDraft {
    #[serde(rename = "uid")]
    pub owner_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub title: String,
    #[serde(rename = "fileName")]
    pub video_file_name: String,
    #[serde(rename = "url")]
    pub video_url: String,
    #[serde(rename = "screenshotFileName")]
    pub thumbnail_file_name: String,
    #[serde(rename = "screenshotUrl")]
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClipRecord {
    pub id: String,
    #[serde(flatten)]
    pub draft: ClipRecordDraft,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl ClipRecord {
    pub fn from_draft(id: impl Into<String>, draft: ClipRecordDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            draft,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum NoticeTone {
    Info,
    Success,
    Error,
}

/// The single status line shown above the upload form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Notice {
    pub tone: NoticeTone,
    pub text: String,
}

impl Notice {
    pub fn uploading() -> Self {
        Self {
            tone: NoticeTone::Info,
            text: "Your clip is uploading... please wait...".to_string(),
        }
    }

    pub fn success() -> Self {
        Self {
            tone: NoticeTone::Success,
            text: "Success! Your clip is now available to the world".to_string(),
        }
    }

    pub fn failure() -> Self {
        Self {
            tone: NoticeTone::Error,
            text: "Upload failed. Please try again later".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub token: SessionToken,
    pub phase: SessionPhase,
    pub paths: RemotePaths,
    pub video: UploadTask,
    pub thumbnail: UploadTask,
    pub combined_progress: f64,
    pub barrier: BarrierState,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub phase: SessionPhase,
    pub session: Option<SessionSnapshot>,
    pub notice: Option<Notice>,
    pub show_percentage: bool,
    pub last_record: Option<ClipRecord>,
}

#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    PhaseChanged {
        token: SessionToken,
        from: SessionPhase,
        to: SessionPhase,
    },

    /// Combined fraction in [0, 1]; only sent when it increases
    Progress {
        token: SessionToken,
        fraction: f64,
    },

    Notice {
        token: SessionToken,
        notice: Notice,
    },

    Published {
        token: SessionToken,
        record: ClipRecord,
    },

    Navigated {
        token: SessionToken,
        segments: Vec<String>,
    },

    /// Diagnostic detail only; the user sees [`Notice::failure`]
    Failed {
        token: SessionToken,
        reason: String,
    },

    Cancelled {
        token: SessionToken,
    },
}

impl CoordinatorEvent {
    pub fn token(&self) -> SessionToken {
        match self {
            CoordinatorEvent::PhaseChanged { token, .. }
            | CoordinatorEvent::Progress { token, .. }
            | CoordinatorEvent::Notice { token, .. }
            | CoordinatorEvent::Published { token, .. }
            | CoordinatorEvent::Navigated { token, .. }
            | CoordinatorEvent::Failed { token, .. }
            | CoordinatorEvent::Cancelled { token } => *token,
        }
    }
}

pub enum CoordinatorCommand {
    Begin {
        submission: Submission,
        reply: oneshot::Sender<Result<SessionSnapshot>>,
    },

    /// Replies whether anything was cancelled
    Cancel {
        reply: oneshot::Sender<bool>,
    },

    Status {
        reply: oneshot::Sender<CoordinatorStatus>,
    },

    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
