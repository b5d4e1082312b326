use serde::{Deserialize, Serialize};
use std::fmt;

/// Participant identifier, chosen by each participant when it joins.
///
/// Ordering is plain lexicographic byte order; the glare rule relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id of the form `client_xxxxxxxxx`
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("client_{}", &raw[..9]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Room identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// Session description as exchanged on the wire (`{type, sdp}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Network-setup candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: None,
            username_fragment: None,
        }
    }
}

/// Transcript content carried by `transcript-update`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptPayload {
    pub committed: String,
    pub interim: String,
    pub language: String,
}

/// Message exchanged over the room channel
///
/// Inbound signaling messages carry `sender_id` (stamped by the relay),
/// outbound ones carry `target_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RoomMessage {
    RoomClients {
        clients: Vec<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recorder_id: Option<ParticipantId>,
    },
    UserJoined {
        client_id: ParticipantId,
        #[serde(default)]
        clients: Vec<ParticipantId>,
    },
    UserLeft {
        client_id: ParticipantId,
        #[serde(default)]
        clients: Vec<ParticipantId>,
    },
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<ParticipantId>,
        offer: SessionDescription,
    },
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<ParticipantId>,
        answer: SessionDescription,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<ParticipantId>,
        candidate: IceCandidate,
    },
    RecordingState {
        active: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner_id: Option<ParticipantId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<ParticipantId>,
    },
    RecordingDenied {
        owner_id: ParticipantId,
    },
    TranscriptUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_id: Option<ParticipantId>,
        committed: String,
        interim: String,
        language: String,
    },
}

impl RoomMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            RoomMessage::RoomClients { .. } => "room-clients",
            RoomMessage::UserJoined { .. } => "user-joined",
            RoomMessage::UserLeft { .. } => "user-left",
            RoomMessage::Offer { .. } => "offer",
            RoomMessage::Answer { .. } => "answer",
            RoomMessage::IceCandidate { .. } => "ice-candidate",
            RoomMessage::RecordingState { .. } => "recording-state",
            RoomMessage::RecordingDenied { .. } => "recording-denied",
            RoomMessage::TranscriptUpdate { .. } => "transcript-update",
        }
    }

    pub fn transcript_update(payload: TranscriptPayload) -> Self {
        RoomMessage::TranscriptUpdate {
            sender_id: None,
            committed: payload.committed,
            interim: payload.interim,
            language: payload.language,
        }
    }

    /// Stamp the sender on outbound messages that carry one
    pub fn with_sender(mut self, id: &ParticipantId) -> Self {
        match &mut self {
            RoomMessage::Offer { sender_id, .. }
            | RoomMessage::Answer { sender_id, .. }
            | RoomMessage::IceCandidate { sender_id, .. }
            | RoomMessage::RecordingState { sender_id, .. }
            | RoomMessage::TranscriptUpdate { sender_id, .. } => {
                *sender_id = Some(id.clone());
            }
            _ => {}
        }
        self
    }
}
