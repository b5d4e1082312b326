//! Room session runtime
//!
//! This module provides the `RoomSession` event loop that owns:
//! - Signaling state for every remote participant
//! - The recorder role and the local speech engine
//! - Transcript authoring, throttled broadcast and persistence
//! - Cancellable timers for throttled sends and recognition restarts

mod config;
mod handle;
mod session;
mod stats;

pub use config::SessionConfig;
pub use handle::{Command, SessionHandle};
pub use session::{RoomSession, SessionDeps};
pub use stats::SessionStatus;
