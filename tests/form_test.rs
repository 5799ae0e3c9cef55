mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use clipdrop::core::{
    Blob, CoordinatorConfig, CoordinatorEvent, ExtractorError, FrameExtractor, SessionPhase,
    StorageError,
};
use clipdrop::memory::{MemoryFrameExtractor, MemoryPublisher, MemoryStorage, RecordingNavigator};
use clipdrop::stager::{RejectReason, StagerConfig, MP4_CONTENT_TYPE};
use clipdrop::{
    Collaborators, FileCandidate, FormError, MediaStager, Owner, StageOutcome, UploadCoordinator,
    UploadForm,
};
use common::*;

/// Extractor whose busy flag is driven by the test.
#[derive(Default)]
struct SwitchableExtractor {
    busy: AtomicBool,
}

#[async_trait]
impl FrameExtractor for SwitchableExtractor {
    async fn init(&self) -> Result<(), ExtractorError> {
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    async fn get_screenshots(&self, video: &Blob) -> Result<Vec<String>, ExtractorError> {
        Ok(vec![format!("frame://{}/0", video.name)])
    }

    async fn blob_from_url(&self, url: &str) -> Result<Blob, ExtractorError> {
        Ok(Blob::new("frame.png", "image/png", url.as_bytes().to_vec()))
    }
}

fn video(name: &str) -> FileCandidate {
    FileCandidate::new(name, MP4_CONTENT_TYPE, vec![7u8; 512])
}

async fn scripted_form(extractor: Arc<dyn FrameExtractor>) -> (UploadForm, Arc<ScriptedStorage>, UploadCoordinator) {
    let storage = Arc::new(ScriptedStorage::new());
    let collaborators = Collaborators::new(
        storage.clone(),
        Arc::new(GatedPublisher::new()),
        Arc::new(RecordingNavigator::new()),
    );
    let handle = UploadCoordinator::new(collaborators, CoordinatorConfig::default());
    let coordinator = handle.coordinator.clone();
    let stager = MediaStager::new(extractor, StagerConfig::default());
    let form = UploadForm::new(stager, coordinator.clone(), 3).await.unwrap();

    (form, storage, coordinator)
}

#[tokio::test]
async fn test_rejects_wrong_type_and_unreadable_files() {
    let (mut form, _, _) = scripted_form(Arc::new(MemoryFrameExtractor::default())).await;

    let outcome = form.stage(FileCandidate::new("notes.txt", "text/plain", b"hi".to_vec())).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Rejected(RejectReason::InvalidInput(_))));

    let outcome = form.stage(FileCandidate::unavailable("gone.mp4", MP4_CONTENT_TYPE)).await.unwrap();
    assert!(matches!(outcome, StageOutcome::Rejected(RejectReason::InvalidInput(_))));

    assert!(form.staged().is_none());
    assert!(!form.next_step());
    assert_eq!(form.phase().await.unwrap(), SessionPhase::Idle);
}

#[tokio::test]
async fn test_stage_derives_title_and_frames() {
    let (mut form, _, _) = scripted_form(Arc::new(MemoryFrameExtractor::default())).await;

    assert_eq!(form.stage(video("summer.holiday.mp4")).await.unwrap(), StageOutcome::Staged);

    let staged = form.staged().unwrap();
    assert_eq!(staged.title, "summer.holiday");
    assert_eq!(staged.screenshots.len(), 3);
    assert_eq!(staged.selected, 0);
    assert!(form.next_step());
    assert_eq!(form.phase().await.unwrap(), SessionPhase::Staging);

    assert!(form.select_screenshot(2));
    assert!(!form.select_screenshot(3));
    assert_eq!(form.staged().unwrap().selected, 2);
}

#[tokio::test]
async fn test_busy_extractor_ignores_new_file() {
    let extractor = Arc::new(SwitchableExtractor::default());
    let (mut form, _, _) = scripted_form(extractor.clone()).await;
    form.stage(video("first.mp4")).await.unwrap();

    extractor.busy.store(true, Ordering::SeqCst);
    let outcome = form.stage(video("second.mp4")).await.unwrap();

    assert_eq!(outcome, StageOutcome::Rejected(RejectReason::ExtractorBusy));
    assert_eq!(form.staged().unwrap().video.name, "first.mp4");
}

#[tokio::test]
async fn test_submit_validation() {
    let (mut form, storage, _) = scripted_form(Arc::new(MemoryFrameExtractor::default())).await;
    assert!(matches!(form.submit().await, Err(FormError::NothingStaged)));

    form.stage(video("clip.mp4")).await.unwrap();

    form.set_title("   ");
    assert!(matches!(form.submit().await, Err(FormError::TitleRequired)));

    form.set_title("ab");
    assert!(matches!(form.submit().await, Err(FormError::TitleTooShort { min: 3 })));

    form.set_title("abc");
    assert!(matches!(form.submit().await, Err(FormError::NotSignedIn)));

    assert!(storage.uploads().is_empty());
}

#[tokio::test]
async fn test_failed_upload_keeps_staging_for_retry() {
    let (mut form, storage, coordinator) = scripted_form(Arc::new(MemoryFrameExtractor::default())).await;
    let mut events = coordinator.subscribe_events();
    form.set_owner(Some(Owner::new("uid-7", "Grace")));
    form.stage(video("retry.mp4")).await.unwrap();

    let first = form.submit().await.unwrap();
    assert!(!form.is_editable().await.unwrap());
    assert!(matches!(
        form.submit().await,
        Err(FormError::Upload(clipdrop::UploadError::SessionActive))
    ));

    storage.finish(&first.paths.video, Err(StorageError::transport("offline")));
    next_event(&mut events, |event| matches!(event, CoordinatorEvent::Failed { .. })).await;

    assert!(form.is_editable().await.unwrap());
    assert_eq!(form.phase().await.unwrap(), SessionPhase::Failed);
    assert_eq!(form.staged().unwrap().title, "retry");

    let second = form.submit().await.unwrap();
    assert_ne!(second.token, first.token);
    assert_eq!(second.phase, SessionPhase::Uploading);
}

#[tokio::test]
async fn test_cancel_returns_form_to_editable() {
    let (mut form, _, _) = scripted_form(Arc::new(MemoryFrameExtractor::default())).await;
    form.set_owner(Some(Owner::new("uid-7", "Grace")));
    form.stage(video("oops.mp4")).await.unwrap();
    form.submit().await.unwrap();

    assert!(form.cancel().await.unwrap());
    assert!(form.is_editable().await.unwrap());
    assert_eq!(form.phase().await.unwrap(), SessionPhase::Staging);
}

#[tokio::test]
async fn test_end_to_end_with_memory_backends() {
    let storage = MemoryStorage::new("https://cdn.example.com/bucket/".parse().unwrap()).with_chunk_size(64);
    let publisher = Arc::new(MemoryPublisher::new());
    let navigator = Arc::new(RecordingNavigator::new());
    let collaborators = Collaborators::new(Arc::new(storage.clone()), publisher.clone(), navigator.clone());
    let config = CoordinatorConfig {
        navigate_delay: Duration::ZERO,
        ..Default::default()
    };
    let handle = UploadCoordinator::new(collaborators, config);
    let mut events = handle.coordinator.subscribe_events();

    let stager = MediaStager::new(Arc::new(MemoryFrameExtractor::default()), StagerConfig::default());
    let mut form = UploadForm::new(stager, handle.coordinator.clone(), 3).await.unwrap();
    form.set_owner(Some(Owner::new("uid-9", "Linus")));
    form.stage(video("launch.mp4")).await.unwrap();
    form.select_screenshot(1);
    form.set_title("Launch day");

    let snapshot = form.submit().await.unwrap();
    let mut last = 0.0;
    loop {
        match next_event(&mut events, |_| true).await {
            CoordinatorEvent::Progress { fraction, .. } => {
                assert!(fraction >= last);
                last = fraction;
            }
            CoordinatorEvent::Navigated { .. } => break,
            CoordinatorEvent::Failed { reason, .. } => panic!("upload failed: {}", reason),
            _ => {}
        }
    }
    assert_close(last, 1.0);

    let records = publisher.records().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.draft.title, "Launch day");
    assert_eq!(record.draft.owner_id, "uid-9");
    assert_eq!(record.draft.video_url, format!("https://cdn.example.com/bucket/{}", snapshot.paths.video));
    assert_eq!(navigator.visited().await, vec![vec!["clip".to_string(), record.id.clone()]]);

    assert_eq!(storage.object(&snapshot.paths.video).await.unwrap().len(), 512);
    let thumbnail = storage.object(&snapshot.paths.thumbnail).await.unwrap();
    assert!(thumbnail.ends_with(b"launch.mp4#1"));
    assert!(!form.is_editable().await.unwrap());

    handle.shutdown().await.unwrap();
}
