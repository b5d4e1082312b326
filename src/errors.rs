//! Signaling error types.
//!
//! Every variant is contained to the entity that raised it: a failing peer
//! never takes down the session, and recorder errors never touch peers.

use thiserror::Error;

use crate::signaling::{NegotiationState, ParticipantId};

#[derive(Debug, Error)]
pub enum SignalingError {
    /// A negotiation event arrived in a state that does not accept it.
    #[error("peer {peer}: {event} not valid in state {state:?}")]
    IllegalTransition {
        peer: ParticipantId,
        event: &'static str,
        state: NegotiationState,
    },

    /// A message referenced a peer this session has no record for.
    #[error("unknown peer: {0}")]
    UnknownPeer(ParticipantId),

    /// The negotiation engine rejected an operation.
    #[error("negotiation with {peer} failed: {reason}")]
    Negotiation { peer: ParticipantId, reason: String },

    /// Another participant holds the recorder role.
    #[error("recorder role is held by {0}")]
    RecorderBusy(ParticipantId),

    /// Only the current owner may release the recorder role.
    #[error("{0} does not hold the recorder role")]
    NotRecorder(ParticipantId),

    /// The session was already torn down.
    #[error("session closed")]
    SessionClosed,
}
