// Dry-run negotiation engine
//
// Produces placeholder descriptions and a single host candidate per link so
// the signaling exchange can be rehearsed end to end without a media stack.
// A link reports `connected` once both descriptions are in place and the
// first remote candidate has been added.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use super::{ConnectionState, EngineSink, IceServer, NegotiationEngine, PeerConnection};
use crate::signaling::{IceCandidate, ParticipantId, SessionDescription};

pub struct DryRunEngine {
    local_id: ParticipantId,
    next_session: AtomicU64,
}

impl DryRunEngine {
    pub fn new(local_id: ParticipantId) -> Self {
        Self {
            local_id,
            next_session: AtomicU64::new(1),
        }
    }
}

impl NegotiationEngine for DryRunEngine {
    fn open(
        &self,
        peer: &ParticipantId,
        ice_servers: &[IceServer],
        events: EngineSink,
    ) -> Result<Arc<dyn PeerConnection>> {
        let session = self.next_session.fetch_add(1, Ordering::SeqCst);
        info!(
            "Dry-run link {} -> {} (session {}, {} ICE servers)",
            self.local_id,
            peer,
            session,
            ice_servers.len()
        );

        Ok(Arc::new(DryRunConnection {
            origin: format!("{} {}", self.local_id, session),
            events,
            local_set: AtomicBool::new(false),
            remote_set: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            connected: AtomicBool::new(false),
        }))
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}

struct DryRunConnection {
    origin: String,
    events: EngineSink,
    local_set: AtomicBool,
    remote_set: AtomicBool,
    closed: AtomicBool,
    connected: AtomicBool,
}

impl DryRunConnection {
    fn sdp(&self) -> String {
        format!("v=0\r\no=- {} 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n", self.origin)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            bail!("connection closed");
        }
        Ok(())
    }

    fn maybe_connected(&self) {
        if self.local_set.load(Ordering::SeqCst) && self.remote_set.load(Ordering::SeqCst) {
            self.events
                .connection_state_changed(ConnectionState::Connecting);
            self.events.connection_state_changed(ConnectionState::Connected);
        } else {
            self.connected.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait::async_trait]
impl PeerConnection for DryRunConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.ensure_open()?;
        Ok(SessionDescription::offer(self.sdp()))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.ensure_open()?;
        if !self.remote_set.load(Ordering::SeqCst) {
            bail!("cannot answer without a remote offer");
        }
        Ok(SessionDescription::answer(self.sdp()))
    }

    async fn set_local_description(&self, _description: &SessionDescription) -> Result<()> {
        self.ensure_open()?;
        self.local_set.store(true, Ordering::SeqCst);
        self.events.local_candidate(IceCandidate {
            candidate: "candidate:1 1 udp 2122260223 127.0.0.1 9 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
            username_fragment: None,
        });
        Ok(())
    }

    async fn set_remote_description(&self, _description: &SessionDescription) -> Result<()> {
        self.ensure_open()?;
        self.remote_set.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn add_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        self.ensure_open()?;
        if candidate.candidate.is_empty() {
            bail!("empty candidate");
        }
        if !self.connected.swap(true, Ordering::SeqCst) {
            self.maybe_connected();
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
