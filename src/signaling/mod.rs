//! Room signaling
//!
//! This module owns everything a participant needs to negotiate peer links
//! inside one room:
//! - `CandidateQueue` buffers candidates that arrive too early
//! - `PeerNegotiation` drives the offer/answer exchange with one peer
//! - `SignalingSession` owns the peer records, applies the glare rule and
//!   dispatches inbound room messages
//!
//! Engine work for each peer runs on its own link worker; completions and
//! engine callbacks come back as [`SignalingEvent`]s on the session queue.

mod candidates;
mod channel;
mod link;
mod messages;
mod peer;
mod session;

pub use candidates::CandidateQueue;
pub use channel::RoomChannel;
pub use link::{LinkHandle, LinkOp};
pub use messages::{
    IceCandidate, ParticipantId, RoomId, RoomMessage, SdpType, SessionDescription,
    TranscriptPayload,
};
pub use peer::{NegotiationState, PeerNegotiation};
pub use session::{Dispatch, PeerSnapshot, SignalingSession};

use crate::engine::ConnectionState;

/// Event produced off the session task and consumed by it
#[derive(Debug)]
pub enum SignalingEvent {
    Link(LinkOutcome),
    Engine(EngineNotification),
}

/// Result of a link worker operation
#[derive(Debug)]
pub struct LinkOutcome {
    pub peer: ParticipantId,
    pub generation: u64,
    pub result: LinkResult,
}

#[derive(Debug)]
pub enum LinkResult {
    OfferReady(anyhow::Result<SessionDescription>),
    AnswerReady(anyhow::Result<SessionDescription>),
    AnswerApplied(anyhow::Result<()>),
    CandidateRejected(IceCandidate),
}

/// Callback raised by the negotiation engine
#[derive(Debug)]
pub struct EngineNotification {
    pub peer: ParticipantId,
    pub generation: u64,
    pub kind: EngineEventKind,
}

#[derive(Debug)]
pub enum EngineEventKind {
    ConnectionState(ConnectionState),
    LocalCandidate(IceCandidate),
}
