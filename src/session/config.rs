use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::signaling::{ParticipantId, RoomId};

/// Configuration for one room membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Room to join (e.g., "standup")
    pub room: RoomId,

    /// Identifier of the local participant
    pub client_id: ParticipantId,

    /// Language tag handed to the speech engine and carried in transcript updates
    pub language: String,

    /// Minimum spacing between transcript broadcasts
    /// Default: 300 ms
    pub broadcast_interval: Duration,

    /// First speech engine restart delay after a recoverable fault
    pub restart_initial: Duration,

    /// Upper bound for the restart delay
    pub restart_max: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room: RoomId::new("lobby"),
            client_id: ParticipantId::generate(),
            language: "en-US".to_string(),
            broadcast_interval: Duration::from_millis(300),
            restart_initial: Duration::from_millis(500),
            restart_max: Duration::from_secs(8),
        }
    }
}
