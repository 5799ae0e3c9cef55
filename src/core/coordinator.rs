use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use super::errors::{Result, UploadError};
use super::traits::Collaborators;
use super::types::{CoordinatorCommand, CoordinatorEvent, CoordinatorStatus, SessionSnapshot, SessionToken, Submission};
use super::worker::CoordinatorWorker;

pub const DEFAULT_NAVIGATE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Pause between a successful publish and navigating to the clip. Zero
    /// navigates right away.
    pub navigate_delay: Duration,
    /// Sessions still running after this long are failed.
    pub max_session_lifetime: Option<Duration>,
    pub command_capacity: usize,
    pub event_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            navigate_delay: DEFAULT_NAVIGATE_DELAY,
            max_session_lifetime: None,
            command_capacity: 64,
            event_capacity: 256,
        }
    }
}

/// Runs one video + thumbnail upload session at a time.
///
/// Cloning is cheap; every clone talks to the same control loop.
#[derive(Clone)]
pub struct UploadCoordinator {
    command_tx: mpsc::Sender<CoordinatorCommand>,
    event_tx: broadcast::Sender<CoordinatorEvent>,
}

/// The coordinator plus its control loop task
pub struct UploadCoordinatorHandle {
    pub coordinator: UploadCoordinator,
    pub worker_handle: JoinHandle<()>,
}

impl UploadCoordinatorHandle {
    /// Stops the control loop, cancelling any session in flight.
    pub async fn shutdown(self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.coordinator
            .command_tx
            .send(CoordinatorCommand::Shutdown { reply: reply_tx })
            .await
            .is_ok()
        {
            let _ = reply_rx.await;
        }

        self.worker_handle.await
            .map_err(|err| UploadError::internal_error(format!("Worker panic: {}", err)))
    }
}

impl UploadCoordinator {
    pub fn new(collaborators: Collaborators, config: CoordinatorConfig) -> UploadCoordinatorHandle {
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        let worker = CoordinatorWorker::new(collaborators, config, event_tx.clone());
        let worker_handle = tokio::spawn(worker.run(command_rx));

        let coordinator = Self {
            command_tx,
            event_tx,
        };

        UploadCoordinatorHandle {
            coordinator,
            worker_handle,
        }
    }

    /// Starts uploading the pair. Fails with [`UploadError::SessionActive`]
    /// while another session is uploading or publishing.
    pub async fn begin(&self, submission: Submission) -> Result<SessionSnapshot> {
        self.request(|reply| CoordinatorCommand::Begin { submission, reply })
            .await?
    }

    /// Cancels the active session, or a navigation still pending after a
    /// successful one. Returns whether anything was cancelled.
    pub async fn cancel(&self) -> Result<bool> {
        self.request(|reply| CoordinatorCommand::Cancel { reply }).await
    }

    pub async fn status(&self) -> Result<CoordinatorStatus> {
        self.request(|reply| CoordinatorCommand::Status { reply }).await
    }

    /// Subscribe to coordinator events
    ///
    /// A receiver that falls more than the configured event capacity behind
    /// gets a lagged error and misses events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.event_tx.subscribe()
    }

    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredEventReceiver<F> {
        FilteredEventReceiver {
            receiver: self.event_tx.subscribe(),
            filter,
        }
    }

    /// Events of one session only.
    pub fn subscribe_session(&self, token: SessionToken) -> FilteredEventReceiver<impl Fn(&CoordinatorEvent) -> bool> {
        self.subscribe_filtered(move |event: &CoordinatorEvent| event.token() == token)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> CoordinatorCommand) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| UploadError::CoordinatorShutdown)?;

        reply_rx
            .await
            .map_err(|_| UploadError::CoordinatorShutdown)
    }
}

/// Event receiver that skips events rejected by `filter`
pub struct FilteredEventReceiver<F> {
    receiver: broadcast::Receiver<CoordinatorEvent>,
    filter: F,
}

impl<F> FilteredEventReceiver<F>
where
    F: Fn(&CoordinatorEvent) -> bool,
{
    pub async fn recv(&mut self) -> Result<CoordinatorEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if (self.filter)(&event) {
                return Ok(event);
            }
        }
    }
}
