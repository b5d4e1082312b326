use tokio::sync::{mpsc, oneshot};

use super::stats::SessionStatus;
use crate::errors::SignalingError;
use crate::recorder::TranscriptState;

/// Requests served by the session loop
#[derive(Debug)]
pub enum Command {
    StartRecording {
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },
    StopRecording {
        respond_to: oneshot::Sender<Result<(), SignalingError>>,
    },
    Status {
        respond_to: oneshot::Sender<SessionStatus>,
    },
    Transcript {
        respond_to: oneshot::Sender<TranscriptState>,
    },
    Leave {
        respond_to: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running [`super::RoomSession`]
///
/// Every call fails with [`SignalingError::SessionClosed`] once the session
/// loop has exited.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<Command>,
}

impl SessionHandle {
    pub(crate) fn new(sender: mpsc::Sender<Command>) -> Self {
        Self { sender }
    }

    /// Claim the recorder role and start local speech recognition
    pub async fn start_recording(&self) -> Result<(), SignalingError> {
        self.request(|respond_to| Command::StartRecording { respond_to })
            .await?
    }

    /// Finalize the transcript and release the recorder role
    pub async fn stop_recording(&self) -> Result<(), SignalingError> {
        self.request(|respond_to| Command::StopRecording { respond_to })
            .await?
    }

    pub async fn status(&self) -> Result<SessionStatus, SignalingError> {
        self.request(|respond_to| Command::Status { respond_to })
            .await
    }

    pub async fn transcript(&self) -> Result<TranscriptState, SignalingError> {
        self.request(|respond_to| Command::Transcript { respond_to })
            .await
    }

    /// Leave the room; the session loop exits afterwards
    pub async fn leave(&self) -> Result<(), SignalingError> {
        self.request(|respond_to| Command::Leave { respond_to })
            .await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Completes once the session loop has exited
    pub async fn closed(&self) {
        self.sender.closed().await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| SignalingError::SessionClosed)?;
        rx.await.map_err(|_| SignalingError::SessionClosed)
    }
}
