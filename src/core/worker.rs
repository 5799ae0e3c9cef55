use std::sync::Arc;
use std::time::Duration;
use futures::future::try_join;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use super::coordinator::CoordinatorConfig;
use super::errors::{PublishError, Result, StorageError, UploadError};
use super::paths::RemotePaths;
use super::session::{BarrierTransition, UploadSession};
use super::traits::{BlobStorage, Collaborators, MetadataPublisher, Navigator, StorageTask};
use super::types::{
    ClipRecord, CoordinatorCommand, CoordinatorEvent, CoordinatorStatus, Notice,
    SessionPhase, SessionSnapshot, SessionToken, Submission, UploadKind,
};

/// Effects reported back to the control loop by the tasks it spawned. Each one
/// carries the token of the session it belongs to.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    Progress {
        token: SessionToken,
        kind: UploadKind,
        fraction: f64,
    },

    Completed {
        token: SessionToken,
        kind: UploadKind,
        result: Result<(), StorageError>,
    },

    UrlsResolved {
        token: SessionToken,
        result: Result<(String, String)>,
    },

    Published {
        token: SessionToken,
        result: Result<ClipRecord, PublishError>,
    },

    NavigateDue {
        token: SessionToken,
        record_id: String,
    },

    Expired {
        token: SessionToken,
    },
}

struct PendingNavigation {
    token: SessionToken,
    cancel: CancellationToken,
}

/// Control loop that owns the coordinator's state.
///
/// Commands and session events are handled one at a time, so session state is
/// never touched concurrently.
pub(crate) struct CoordinatorWorker {
    storage: Arc<dyn BlobStorage>,
    publisher: Arc<dyn MetadataPublisher>,
    navigator: Arc<dyn Navigator>,
    config: CoordinatorConfig,

    phase: SessionPhase,
    session: Option<UploadSession>,
    pending_navigation: Option<PendingNavigation>,
    notice: Option<Notice>,
    last_record: Option<ClipRecord>,

    event_tx: broadcast::Sender<CoordinatorEvent>,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl CoordinatorWorker {
    pub(crate) fn new(
        collaborators: Collaborators,
        config: CoordinatorConfig,
        event_tx: broadcast::Sender<CoordinatorEvent>,
    ) -> Self {
        let (session_tx, session_rx) = mpsc::unbounded_channel();

        Self {
            storage: collaborators.storage,
            publisher: collaborators.publisher,
            navigator: collaborators.navigator,
            config,
            phase: SessionPhase::Idle,
            session: None,
            pending_navigation: None,
            notice: None,
            last_record: None,
            event_tx,
            session_tx,
            session_rx,
        }
    }

    pub(crate) async fn run(mut self, mut command_rx: mpsc::Receiver<CoordinatorCommand>) {
        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            return;
                        }
                    }
                    None => break,
                },
                Some(event) = self.session_rx.recv() => {
                    self.handle_session_event(event).await;
                }
            }
        }

        self.teardown();
    }

    /// Returns `false` once the loop should stop.
    async fn handle_command(&mut self, command: CoordinatorCommand) -> bool {
        match command {
            CoordinatorCommand::Begin { submission, reply } => {
                let result = self.begin(submission).await;
                let _ = reply.send(result);
            }
            CoordinatorCommand::Cancel { reply } => {
                let _ = reply.send(self.cancel());
            }
            CoordinatorCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            CoordinatorCommand::Shutdown { reply } => {
                self.teardown();
                let _ = reply.send(());
                return false;
            }
        }

        true
    }

    async fn begin(&mut self, submission: Submission) -> Result<SessionSnapshot> {
        if self.phase.is_busy() {
            warn!(phase = ?self.phase, "refusing submission while a session is active");
            return Err(UploadError::SessionActive);
        }

        self.preempt_navigation();

        let Submission { video, thumbnail, title, owner } = submission;
        let token = SessionToken::new();
        let paths = RemotePaths::generate();
        let session = UploadSession::new(token, paths.clone(), title, owner);
        let cancel = session.cancellation_token();

        info!(%token, video = %paths.video, thumbnail = %paths.thumbnail, "starting upload session");
        self.session = Some(session);
        self.last_record = None;
        self.transition(token, SessionPhase::Uploading);
        self.set_notice(token, Some(Notice::uploading()));

        for (kind, blob) in [(UploadKind::Video, video), (UploadKind::Thumbnail, thumbnail)] {
            match self.storage.upload(paths.path(kind), blob).await {
                Ok(task) => {
                    if let Some(session) = self.session.as_mut() {
                        session.mark_started(kind);
                    }
                    tokio::spawn(pump_task(token, kind, task, cancel.clone(), self.session_tx.clone()));
                }
                Err(err) => {
                    return self
                        .fail_session(token, UploadError::upload_failure(kind, err))
                        .ok_or_else(|| UploadError::internal_error("session vanished during launch"));
                }
            }
        }

        if let Some(lifetime) = self.config.max_session_lifetime {
            tokio::spawn(expire_after(token, lifetime, cancel, self.session_tx.clone()));
        }

        self.session
            .as_ref()
            .map(|session| session.snapshot(self.phase))
            .ok_or_else(|| UploadError::internal_error("session vanished during launch"))
    }

    fn cancel(&mut self) -> bool {
        if let Some(mut session) = self.session.take() {
            let token = session.token();
            session.cancel_tasks();
            info!(%token, "upload session cancelled");

            self.transition(token, SessionPhase::Idle);
            self.set_notice(token, None);
            self.emit(CoordinatorEvent::Cancelled { token });
            return true;
        }

        if let Some(pending) = self.pending_navigation.take() {
            pending.cancel.cancel();
            info!(token = %pending.token, "pending navigation cancelled");
            self.emit(CoordinatorEvent::Cancelled { token: pending.token });
            return true;
        }

        false
    }

    fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            phase: self.phase,
            session: self.session.as_ref().map(|session| session.snapshot(self.phase)),
            notice: self.notice.clone(),
            show_percentage: self.phase.is_busy(),
            last_record: self.last_record.clone(),
        }
    }

    pub(crate) async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Progress { token, kind, fraction } => {
                let Some(session) = self.active_session(token) else {
                    return self.discard(token, "progress");
                };

                if let Some(combined) = session.apply_progress(kind, fraction) {
                    debug!(%token, %kind, fraction, combined, "progress");
                    self.emit(CoordinatorEvent::Progress { token, fraction: combined });
                }
            }
            SessionEvent::Completed { token, kind, result } => {
                let Some(session) = self.active_session(token) else {
                    return self.discard(token, "completion");
                };

                let before = session.combined_progress();
                let transition = session.apply_completion(kind, result.is_ok());
                let after = session.combined_progress();
                if after > before {
                    self.emit(CoordinatorEvent::Progress { token, fraction: after });
                }

                match transition {
                    BarrierTransition::Satisfied => {
                        info!(%token, "both uploads committed");
                        self.start_resolution(token);
                    }
                    BarrierTransition::Failed => {
                        let source = result
                            .err()
                            .unwrap_or_else(|| StorageError::transport("upload reported failure"));
                        self.fail_session(token, UploadError::upload_failure(kind, source));
                    }
                    BarrierTransition::Pending => {
                        debug!(%token, %kind, "upload committed, waiting for sibling");
                    }
                    BarrierTransition::Unchanged => {
                        debug!(%token, %kind, "ignoring repeated completion");
                    }
                }
            }
            SessionEvent::UrlsResolved { token, result } => {
                let Some(session) = self.active_session(token) else {
                    return self.discard(token, "url resolution");
                };

                match result {
                    Ok((video_url, thumbnail_url)) => {
                        if !session.begin_publish() {
                            debug!(%token, "publish already started");
                            return;
                        }

                        let draft = session.build_draft(video_url, thumbnail_url);
                        let cancel = session.cancellation_token();
                        let publisher = self.publisher.clone();
                        let session_tx = self.session_tx.clone();

                        tokio::spawn(async move {
                            tokio::select! {
                                _ = cancel.cancelled() => {
                                    debug!(%token, "publish abandoned");
                                }
                                result = publisher.create_clip(draft) => {
                                    let _ = session_tx.send(SessionEvent::Published { token, result });
                                }
                            }
                        });
                    }
                    Err(err) => {
                        self.fail_session(token, err);
                    }
                }
            }
            SessionEvent::Published { token, result } => {
                if self.active_session(token).is_none() {
                    return self.discard(token, "publish result");
                }

                match result {
                    Ok(record) => {
                        let cancel = self
                            .session
                            .take()
                            .map(|session| session.cancellation_token())
                            .unwrap_or_default();

                        info!(%token, id = %record.id, "clip published");
                        self.transition(token, SessionPhase::Succeeded);
                        self.set_notice(token, Some(Notice::success()));
                        self.last_record = Some(record.clone());
                        self.emit(CoordinatorEvent::Published { token, record: record.clone() });
                        self.schedule_navigation(token, record.id, cancel);
                    }
                    Err(err) => {
                        self.fail_session(token, UploadError::PublishFailure(err));
                    }
                }
            }
            SessionEvent::NavigateDue { token, record_id } => {
                if self.pending_navigation.take_if(|pending| pending.token == token).is_none() {
                    return self.discard(token, "navigation");
                }

                let segments = vec!["clip".to_string(), record_id];
                match self.navigator.navigate(&segments).await {
                    Ok(()) => {
                        info!(%token, path = ?segments, "navigated to clip");
                        self.emit(CoordinatorEvent::Navigated { token, segments });
                    }
                    Err(err) => {
                        error!(%token, error = %err, "navigation failed");
                    }
                }
            }
            SessionEvent::Expired { token } => {
                if self.active_session(token).is_none() {
                    return self.discard(token, "expiry");
                }

                let lifetime = self.config.max_session_lifetime.unwrap_or_default();
                self.fail_session(token, UploadError::SessionExpired(lifetime));
            }
        }
    }

    fn start_resolution(&mut self, token: SessionToken) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let paths = session.paths().clone();
        let cancel = session.cancellation_token();
        let storage = self.storage.clone();
        let session_tx = self.session_tx.clone();
        self.transition(token, SessionPhase::Publishing);

        tokio::spawn(async move {
            let video = resolve_url(storage.as_ref(), UploadKind::Video, &paths.video);
            let thumbnail = resolve_url(storage.as_ref(), UploadKind::Thumbnail, &paths.thumbnail);

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(%token, "url resolution abandoned");
                }
                result = try_join(video, thumbnail) => {
                    let _ = session_tx.send(SessionEvent::UrlsResolved { token, result });
                }
            }
        });
    }

    fn schedule_navigation(&mut self, token: SessionToken, record_id: String, cancel: CancellationToken) {
        let delay = self.config.navigate_delay;
        let session_tx = self.session_tx.clone();
        self.pending_navigation = Some(PendingNavigation {
            token,
            cancel: cancel.clone(),
        });

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = session_tx.send(SessionEvent::NavigateDue { token, record_id });
                }
            }
        });
    }

    /// Tears down the session and reports the uniform failure. Returns the
    /// final snapshot, or `None` if `token` is not the active session.
    fn fail_session(&mut self, token: SessionToken, err: UploadError) -> Option<SessionSnapshot> {
        let mut session = self.session.take_if(|session| session.token() == token)?;
        session.cancel_tasks();
        error!(%token, error = %err, "upload session failed");

        self.transition(token, SessionPhase::Failed);
        self.set_notice(token, Some(Notice::failure()));
        self.emit(CoordinatorEvent::Failed {
            token,
            reason: err.to_string(),
        });

        Some(session.snapshot(self.phase))
    }

    fn preempt_navigation(&mut self) {
        if let Some(pending) = self.pending_navigation.take() {
            pending.cancel.cancel();
            debug!(token = %pending.token, "pending navigation pre-empted");
        }
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.cancel_tasks();
            info!(token = %session.token(), "coordinator stopped, active session cancelled");
        }
        self.preempt_navigation();
    }

    fn active_session(&mut self, token: SessionToken) -> Option<&mut UploadSession> {
        self.session.as_mut().filter(|session| session.token() == token)
    }

    fn discard(&self, token: SessionToken, what: &'static str) {
        debug!(%token, event = what, "discarding event for inactive session");
    }

    fn transition(&mut self, token: SessionToken, to: SessionPhase) {
        let from = std::mem::replace(&mut self.phase, to);
        if from != to {
            self.emit(CoordinatorEvent::PhaseChanged { token, from, to });
        }
    }

    fn set_notice(&mut self, token: SessionToken, notice: Option<Notice>) {
        self.notice = notice.clone();
        if let Some(notice) = notice {
            self.emit(CoordinatorEvent::Notice { token, notice });
        }
    }

    fn emit(&self, event: CoordinatorEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Forwards one storage task's progress and outcome into the control loop
/// until it finishes or the session is cancelled.
async fn pump_task(
    token: SessionToken,
    kind: UploadKind,
    task: StorageTask,
    cancel: CancellationToken,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    let StorageTask { mut progress, mut completion, cancel: storage_cancel } = task;
    let mut progress_open = true;

    let result = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                storage_cancel.cancel();
                debug!(%token, %kind, "upload cancelled");
                return;
            }
            fraction = progress.recv(), if progress_open => match fraction {
                Some(fraction) => {
                    let _ = session_tx.send(SessionEvent::Progress { token, kind, fraction });
                }
                None => progress_open = false,
            },
            result = &mut completion => {
                break result.unwrap_or_else(|_| Err(StorageError::transport("completion signal dropped")));
            }
        }
    };

    while let Ok(fraction) = progress.try_recv() {
        let _ = session_tx.send(SessionEvent::Progress { token, kind, fraction });
    }
    let _ = session_tx.send(SessionEvent::Completed { token, kind, result });
}

async fn expire_after(
    token: SessionToken,
    lifetime: Duration,
    cancel: CancellationToken,
    session_tx: mpsc::UnboundedSender<SessionEvent>,
) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(lifetime) => {
            let _ = session_tx.send(SessionEvent::Expired { token });
        }
    }
}

async fn resolve_url(storage: &dyn BlobStorage, kind: UploadKind, path: &str) -> Result<String> {
    storage
        .download_url(path)
        .await
        .map_err(|source| UploadError::resolution_failure(kind, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;
    use chrono::Utc;
    use crate::core::errors::NavigationError;
    use crate::core::traits::StorageTaskSender;
    use crate::core::types::{Blob, ClipRecordDraft, Owner};

    #[derive(Default)]
    struct HeldStorage {
        senders: Mutex<Vec<StorageTaskSender>>,
    }

    #[async_trait]
    impl BlobStorage for HeldStorage {
        async fn upload(&self, _path: &str, _blob: Blob) -> Result<StorageTask, StorageError> {
            let (sender, task) = StorageTask::channel();
            self.senders.lock().unwrap().push(sender);
            Ok(task)
        }

        async fn download_url(&self, path: &str) -> Result<String, StorageError> {
            Ok(format!("https://cdn.test/{}", path))
        }
    }

    #[derive(Default)]
    struct CountingPublisher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataPublisher for CountingPublisher {
        async fn create_clip(&self, draft: ClipRecordDraft) -> Result<ClipRecord, PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ClipRecord::from_draft("clip-1", draft, Utc::now()))
        }
    }

    struct NoopNavigator;

    #[async_trait]
    impl Navigator for NoopNavigator {
        async fn navigate(&self, _segments: &[String]) -> Result<(), NavigationError> {
            Ok(())
        }
    }

    fn worker(publisher: Arc<CountingPublisher>) -> CoordinatorWorker {
        let (event_tx, _) = broadcast::channel(64);
        let collaborators = Collaborators::new(
            Arc::new(HeldStorage::default()),
            publisher,
            Arc::new(NoopNavigator),
        );
        CoordinatorWorker::new(collaborators, CoordinatorConfig::default(), event_tx)
    }

    fn submission() -> Submission {
        Submission {
            video: Blob::new("clip.mp4", "video/mp4", vec![0u8; 16]),
            thumbnail: Blob::new("frame.png", "image/png", vec![1u8; 4]),
            title: "clip".to_string(),
            owner: Owner::new("uid-1", "Ada"),
        }
    }

    #[tokio::test]
    async fn test_stale_token_events_do_not_mutate_state() {
        let publisher = Arc::new(CountingPublisher::default());
        let mut worker = worker(publisher.clone());
        let snapshot = worker.begin(submission()).await.unwrap();
        let stale = SessionToken::new();

        worker.handle_session_event(SessionEvent::Progress {
            token: stale,
            kind: UploadKind::Video,
            fraction: 0.9,
        }).await;
        for kind in [UploadKind::Video, UploadKind::Thumbnail] {
            worker.handle_session_event(SessionEvent::Completed {
                token: stale,
                kind,
                result: Ok(()),
            }).await;
        }
        worker.handle_session_event(SessionEvent::UrlsResolved {
            token: stale,
            result: Ok(("v".to_string(), "t".to_string())),
        }).await;

        let status = worker.status();
        let session = status.session.unwrap();
        assert_eq!(session.token, snapshot.token);
        assert_eq!(session.combined_progress, 0.0);
        assert_eq!(status.phase, SessionPhase::Uploading);

        tokio::task::yield_now().await;
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_late_success_after_cancel_is_discarded() {
        let publisher = Arc::new(CountingPublisher::default());
        let mut worker = worker(publisher.clone());
        let snapshot = worker.begin(submission()).await.unwrap();

        assert!(worker.cancel());
        assert_eq!(worker.status().phase, SessionPhase::Idle);

        for kind in [UploadKind::Video, UploadKind::Thumbnail] {
            worker.handle_session_event(SessionEvent::Completed {
                token: snapshot.token,
                kind,
                result: Ok(()),
            }).await;
        }
        worker.handle_session_event(SessionEvent::Published {
            token: snapshot.token,
            result: Ok(ClipRecord::from_draft(
                "late",
                snapshot_draft(),
                Utc::now(),
            )),
        }).await;

        let status = worker.status();
        assert_eq!(status.phase, SessionPhase::Idle);
        assert!(status.session.is_none());
        assert!(status.last_record.is_none());
        assert!(!worker.cancel());
    }

    #[tokio::test]
    async fn test_begin_is_refused_while_active() {
        let mut worker = worker(Arc::new(CountingPublisher::default()));
        worker.begin(submission()).await.unwrap();

        let err = worker.begin(submission()).await.unwrap_err();
        assert!(matches!(err, UploadError::SessionActive));
    }

    fn snapshot_draft() -> ClipRecordDraft {
        ClipRecordDraft {
            owner_id: "uid-1".to_string(),
            display_name: "Ada".to_string(),
            title: "clip".to_string(),
            video_file_name: "x.mp4".to_string(),
            video_url: "v".to_string(),
            thumbnail_file_name: "x.png".to_string(),
            thumbnail_url: "t".to_string(),
        }
    }
}
