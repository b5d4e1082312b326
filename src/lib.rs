pub mod config;
pub mod engine;
pub mod errors;
pub mod http;
pub mod nats;
pub mod recorder;
pub mod services;
pub mod session;
pub mod signaling;
pub mod speech;

pub use config::Config;
pub use engine::{ConnectionState, DryRunEngine, IceServer, NegotiationEngine, PeerConnection};
pub use errors::SignalingError;
pub use http::{create_router, AppState};
pub use nats::{NatsClient, NatsRoomChannel, PresenceKind, TranscriptMessage};
pub use recorder::{CaptureDirective, RecorderArbiter, RecorderState, TranscriptState};
pub use services::{BackendClient, IceConfigProvider, SummaryService, TranscriptStore};
pub use session::{RoomSession, SessionConfig, SessionDeps, SessionHandle, SessionStatus};
pub use signaling::{ParticipantId, RoomChannel, RoomId, RoomMessage, SignalingSession};
pub use speech::{NatsSpeechEngine, SpeechEngine, SpeechEvent};
