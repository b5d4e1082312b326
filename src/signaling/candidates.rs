// Per-peer buffer for candidates that arrive before a remote description.
//
// A buffer lives from record creation until the first drain, after which it
// is sealed: late enqueues are rejected instead of silently piling up.

use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use super::messages::{IceCandidate, ParticipantId};

#[derive(Debug, Default)]
struct PeerBuffer {
    candidates: VecDeque<IceCandidate>,
    sealed: bool,
}

/// FIFO candidate buffers keyed by peer
#[derive(Debug, Default)]
pub struct CandidateQueue {
    buffers: HashMap<ParticipantId, PeerBuffer>,
}

impl CandidateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an empty buffer for a newly created peer record
    pub fn register(&mut self, peer: &ParticipantId) {
        self.buffers.insert(peer.clone(), PeerBuffer::default());
    }

    /// Discard the peer's buffer along with anything still in it
    pub fn remove(&mut self, peer: &ParticipantId) {
        if let Some(buffer) = self.buffers.remove(peer) {
            if !buffer.candidates.is_empty() {
                debug!(
                    "Discarding {} buffered candidates for {}",
                    buffer.candidates.len(),
                    peer
                );
            }
        }
    }

    /// Append a candidate; returns false when it was dropped
    pub fn enqueue(&mut self, peer: &ParticipantId, candidate: IceCandidate) -> bool {
        match self.buffers.get_mut(peer) {
            Some(buffer) if !buffer.sealed => {
                buffer.candidates.push_back(candidate);
                debug!(
                    "Buffered candidate for {} ({} pending)",
                    peer,
                    buffer.candidates.len()
                );
                true
            }
            Some(_) => {
                warn!("Dropping candidate for {}: buffer already drained", peer);
                false
            }
            None => {
                warn!("Dropping candidate for unknown peer {}", peer);
                false
            }
        }
    }

    /// Take every buffered candidate in arrival order and seal the buffer
    pub fn drain(&mut self, peer: &ParticipantId) -> Vec<IceCandidate> {
        match self.buffers.get_mut(peer) {
            Some(buffer) => {
                buffer.sealed = true;
                buffer.candidates.drain(..).collect()
            }
            None => Vec::new(),
        }
    }

    pub fn pending(&self, peer: &ParticipantId) -> usize {
        self.buffers
            .get(peer)
            .map(|buffer| buffer.candidates.len())
            .unwrap_or(0)
    }
}
