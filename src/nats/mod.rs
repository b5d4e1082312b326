pub mod channel;
pub mod client;
pub mod messages;

pub use channel::NatsRoomChannel;
pub use client::{room_subject, NatsClient};
pub use messages::{PresenceKind, PresenceMessage, TranscriptMessage};
