use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::recorder::{RecorderState, TranscriptMode};
use crate::signaling::{ParticipantId, PeerSnapshot, RoomId};

/// Point-in-time view of a room session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub room: RoomId,

    pub client_id: ParticipantId,

    /// When the session started
    pub joined_at: DateTime<Utc>,

    /// Other participants currently in the room
    pub members: Vec<ParticipantId>,

    /// Peer records with their negotiation state
    pub peers: Vec<PeerSnapshot>,

    pub recorder: RecorderState,

    /// Whether the local speech engine is feeding the transcript
    pub is_recording: bool,

    pub transcript_mode: TranscriptMode,

    /// Last user-visible status (collaborator failures, recognition faults)
    pub status_message: Option<String>,
}
