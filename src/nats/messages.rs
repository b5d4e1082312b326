use serde::{Deserialize, Serialize};

use crate::signaling::{ParticipantId, RoomId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceKind {
    Join,
    Leave,
}

/// Presence announcement published on `{prefix}.{room}.presence`
///
/// The relay answers a join with a `room-clients` snapshot on the
/// participant's targeted subject and tells the others with `user-joined`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMessage {
    #[serde(rename = "type")]
    pub kind: PresenceKind,
    pub room: RoomId,
    pub client_id: ParticipantId,
}

/// Transcript message received from STT service
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}
