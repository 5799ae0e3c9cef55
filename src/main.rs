use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use anyhow::{bail, Context};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use clipdrop::config::{Config, DEFAULT_CONFIG_FILE};
use clipdrop::memory::{MemoryFrameExtractor, MemoryPublisher, MemoryStorage, RecordingNavigator};
use clipdrop::stager::MP4_CONTENT_TYPE;
use clipdrop::{
    Collaborators, CoordinatorEvent, FileCandidate, MediaStager, Owner, StageOutcome,
    UploadCoordinator, UploadForm,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load_or_default(DEFAULT_CONFIG_FILE)?;
    let video_path = std::env::args()
        .nth(1)
        .context("usage: clipdrop <video.mp4>")?;
    let data = tokio::fs::read(&video_path)
        .await
        .with_context(|| format!("reading {}", video_path))?;
    let file_name = Path::new(&video_path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("clip.mp4")
        .to_string();

    let storage = MemoryStorage::new(config.storage_base_url()?)
        .with_chunk_size(config.chunk_size)
        .with_chunk_delay(Duration::from_millis(config.chunk_delay_ms));
    let publisher = Arc::new(MemoryPublisher::new());
    let navigator = Arc::new(RecordingNavigator::new());
    let collaborators = Collaborators::new(Arc::new(storage), publisher.clone(), navigator.clone());

    let handle = UploadCoordinator::new(collaborators, config.coordinator());
    let stager = MediaStager::new(Arc::new(MemoryFrameExtractor::default()), config.stager());
    let mut form = UploadForm::new(stager, handle.coordinator.clone(), config.min_title_len).await?;
    form.set_owner(Some(Owner::new("local-user", "Local User")));

    let content_type = if file_name.ends_with(".mp4") { MP4_CONTENT_TYPE } else { "application/octet-stream" };
    if let StageOutcome::Rejected(reason) = form.stage(FileCandidate::new(&file_name, content_type, data)).await? {
        bail!("{} was not accepted: {:?}", file_name, reason);
    }

    let mut events = handle.coordinator.subscribe_events();
    let snapshot = form.submit().await?;
    println!("uploading {} as {}", file_name, snapshot.paths.video);

    let (key_tx, mut key_rx) = mpsc::unbounded_channel();
    let stop = Arc::new(AtomicBool::new(false));
    let raw_mode = enable_raw_mode().is_ok();
    let keyboard = raw_mode.then(|| {
        let stop = stop.clone();
        tokio::task::spawn_blocking(move || watch_keyboard(stop, key_tx))
    });

    loop {
        tokio::select! {
            Some(()) = key_rx.recv() => {
                form.cancel().await?;
            }
            event = events.recv() => match event {
                Ok(CoordinatorEvent::Progress { fraction, .. }) => {
                    print!("\r{:>5.1}%", fraction * 100.0);
                }
                Ok(CoordinatorEvent::Notice { notice, .. }) => {
                    print!("\r\n{}\r\n", notice.text);
                }
                Ok(CoordinatorEvent::Published { record, .. }) => {
                    print!("{}\r\n", serde_json::to_string_pretty(&record)?.replace('\n', "\r\n"));
                }
                Ok(CoordinatorEvent::Navigated { segments, .. }) => {
                    print!("-> /{}\r\n", segments.join("/"));
                    break;
                }
                Ok(CoordinatorEvent::Failed { .. }) | Ok(CoordinatorEvent::Cancelled { .. }) => break,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "event stream interrupted");
                    break;
                }
            },
        }
    }

    stop.store(true, Ordering::SeqCst);
    if let Some(keyboard) = keyboard {
        let _ = keyboard.await;
    }
    if raw_mode {
        disable_raw_mode()?;
    }

    let status = form.status().await?;
    println!("finished in phase {:?} ({} record(s) stored)", status.phase, publisher.records().await.len());
    handle.shutdown().await?;

    Ok(())
}

/// Sends a signal for every `c` key press until `stop` is set.
fn watch_keyboard(stop: Arc<AtomicBool>, key_tx: mpsc::UnboundedSender<()>) -> std::io::Result<()> {
    while !stop.load(Ordering::SeqCst) {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                if kind == KeyEventKind::Press && code == KeyCode::Char('c') {
                    let _ = key_tx.send(());
                }
            }
        }
    }

    Ok(())
}
