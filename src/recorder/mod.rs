//! Recorder role and shared transcript
//!
//! - `RecorderArbiter` proposes, adopts or yields the exclusive recorder role
//! - `TranscriptState` holds the transcript shown to this participant
//! - `TranscriptBroadcastThrottler` rate-limits outgoing transcript updates

mod arbiter;
mod throttle;
mod transcript;

pub use arbiter::{CaptureDirective, RecorderArbiter, RecorderState};
pub use throttle::{Throttled, TranscriptBroadcastThrottler};
pub use transcript::{TranscriptMode, TranscriptState};
