//! Negotiation engine seam
//!
//! The engine that actually sets up media paths is an external
//! collaborator. The session only sees it through these traits:
//! - [`NegotiationEngine`] opens one [`PeerConnection`] per remote participant
//! - [`PeerConnection`] creates/applies descriptions and adds candidates
//! - [`EngineSink`] is handed to the engine so its callbacks (connection
//!   state, gathered candidates) become events on the session queue

pub mod dry_run;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::signaling::{
    EngineEventKind, EngineNotification, IceCandidate, ParticipantId, SessionDescription,
    SignalingEvent,
};

pub use dry_run::DryRunEngine;

/// Relay/reflection server entry handed to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: url.into(),
            username: None,
            credential: None,
        }
    }
}

/// Connection state reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Factory for per-peer connections
pub trait NegotiationEngine: Send + Sync {
    /// Open a connection toward `peer`
    ///
    /// Must not block: the engine reports progress through `events`.
    fn open(
        &self,
        peer: &ParticipantId,
        ice_servers: &[IceServer],
        events: EngineSink,
    ) -> Result<Arc<dyn PeerConnection>>;

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// One negotiated link with a remote participant
#[async_trait::async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, description: &SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, description: &SessionDescription) -> Result<()>;

    async fn add_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    /// Release the connection; must be safe to call more than once
    async fn close(&self);
}

/// Callback endpoint given to the engine for one peer record
#[derive(Debug, Clone)]
pub struct EngineSink {
    peer: ParticipantId,
    generation: u64,
    tx: mpsc::UnboundedSender<SignalingEvent>,
}

impl EngineSink {
    pub fn new(
        peer: ParticipantId,
        generation: u64,
        tx: mpsc::UnboundedSender<SignalingEvent>,
    ) -> Self {
        Self {
            peer,
            generation,
            tx,
        }
    }

    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    pub fn connection_state_changed(&self, state: ConnectionState) {
        self.emit(EngineEventKind::ConnectionState(state));
    }

    pub fn local_candidate(&self, candidate: IceCandidate) {
        self.emit(EngineEventKind::LocalCandidate(candidate));
    }

    fn emit(&self, kind: EngineEventKind) {
        let event = SignalingEvent::Engine(EngineNotification {
            peer: self.peer.clone(),
            generation: self.generation,
            kind,
        });
        if self.tx.send(event).is_err() {
            debug!("Session gone, dropping engine event for {}", self.peer);
        }
    }
}
