use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use super::paths::RemotePaths;
use super::progress::ProgressAggregator;
use super::types::{
    BarrierState, ClipRecordDraft, Owner, SessionPhase, SessionSnapshot, SessionToken,
    TaskState, UploadKind, UploadTask,
};

/// Outcome of feeding a completion signal into the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierTransition {
    /// The sibling has not finished yet
    Pending,
    Satisfied,
    Failed,
    /// Duplicate signal, or the barrier already resolved
    Unchanged,
}

/// State of one video + thumbnail submission.
///
/// Owned by the coordinator's control loop and only mutated there.
#[derive(Debug)]
pub struct UploadSession {
    token: SessionToken,
    paths: RemotePaths,
    title: String,
    owner: Owner,
    video: UploadTask,
    thumbnail: UploadTask,
    aggregator: ProgressAggregator,
    barrier: BarrierState,
    publish_started: bool,
    cancellation_token: CancellationToken,
    started_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn new(token: SessionToken, paths: RemotePaths, title: String, owner: Owner) -> Self {
        Self {
            token,
            video: UploadTask::new(UploadKind::Video, paths.video.clone()),
            thumbnail: UploadTask::new(UploadKind::Thumbnail, paths.thumbnail.clone()),
            paths,
            title,
            owner,
            aggregator: ProgressAggregator::new(),
            barrier: BarrierState::Waiting,
            publish_started: false,
            cancellation_token: CancellationToken::new(),
            started_at: Utc::now(),
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn paths(&self) -> &RemotePaths {
        &self.paths
    }

    pub fn barrier(&self) -> BarrierState {
        self.barrier
    }

    pub fn combined_progress(&self) -> f64 {
        self.aggregator.combined()
    }

    pub fn task(&self, kind: UploadKind) -> &UploadTask {
        match kind {
            UploadKind::Video => &self.video,
            UploadKind::Thumbnail => &self.thumbnail,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Cancelled when the session is cancelled, fails or is torn down. Every
    /// task spawned on behalf of this session watches it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    fn task_mut(&mut self, kind: UploadKind) -> &mut UploadTask {
        match kind {
            UploadKind::Video => &mut self.video,
            UploadKind::Thumbnail => &mut self.thumbnail,
        }
    }

    pub fn mark_started(&mut self, kind: UploadKind) {
        let task = self.task_mut(kind);
        if task.state == TaskState::Pending {
            task.state = TaskState::InProgress;
        }
    }

    /// Applies a progress tick. Returns the new combined fraction only when it
    /// went up.
    pub fn apply_progress(&mut self, kind: UploadKind, fraction: f64) -> Option<f64> {
        if self.barrier != BarrierState::Waiting || self.task(kind).state.is_terminal() {
            return None;
        }

        let before = self.aggregator.combined();
        let after = self.aggregator.observe(kind, fraction);

        let latest = self.aggregator.latest(kind);
        let task = self.task_mut(kind);
        task.state = TaskState::InProgress;
        task.progress = latest;

        (after > before).then_some(after)
    }

    /// Applies a terminal signal from one upload.
    pub fn apply_completion(&mut self, kind: UploadKind, succeeded: bool) -> BarrierTransition {
        if self.barrier != BarrierState::Waiting || self.task(kind).state.is_terminal() {
            return BarrierTransition::Unchanged;
        }

        if !succeeded {
            self.task_mut(kind).state = TaskState::Failed;
            self.barrier = BarrierState::Failed;
            return BarrierTransition::Failed;
        }

        // a committed upload is fully transferred even if it never ticked
        self.aggregator.observe(kind, 1.0);
        let task = self.task_mut(kind);
        task.state = TaskState::Succeeded;
        task.progress = 1.0;

        if self.task(kind.sibling()).state == TaskState::Succeeded {
            self.barrier = BarrierState::Satisfied;
            BarrierTransition::Satisfied
        } else {
            BarrierTransition::Pending
        }
    }

    /// Marks the record write as started. Returns `false` if it already was.
    pub fn begin_publish(&mut self) -> bool {
        if self.barrier != BarrierState::Satisfied || self.publish_started {
            return false;
        }

        self.publish_started = true;
        true
    }

    pub fn build_draft(&self, video_url: String, thumbnail_url: String) -> ClipRecordDraft {
        ClipRecordDraft {
            owner_id: self.owner.uid.clone(),
            display_name: self.owner.display_name.clone(),
            title: self.title.clone(),
            video_file_name: self.paths.file_name(UploadKind::Video),
            video_url,
            thumbnail_file_name: self.paths.file_name(UploadKind::Thumbnail),
            thumbnail_url,
        }
    }

    /// Cancels every task still running for this session.
    pub fn cancel_tasks(&mut self) {
        for kind in [UploadKind::Video, UploadKind::Thumbnail] {
            let task = self.task_mut(kind);
            if !task.state.is_terminal() {
                task.state = TaskState::Cancelled;
            }
        }
        self.cancellation_token.cancel();
    }

    pub fn snapshot(&self, phase: SessionPhase) -> SessionSnapshot {
        SessionSnapshot {
            token: self.token,
            phase,
            paths: self.paths.clone(),
            video: self.video.clone(),
            thumbnail: self.thumbnail.clone(),
            combined_progress: self.aggregator.combined(),
            barrier: self.barrier,
        }
    }
}
