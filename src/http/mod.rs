//! HTTP API server for local control of the room session
//!
//! This module provides a REST API standing in for the participant's UI:
//! - GET /health - Health check
//! - GET /session - Session status (peers, recorder, status message)
//! - GET /session/transcript - Transcript shown to this participant
//! - POST /session/recording/start - Claim the recorder role
//! - POST /session/recording/stop - Finalize and release the recorder role
//! - POST /session/summary - Summarize the room's persisted transcripts
//! - POST /session/summary/document - Download a summary document
//! - POST /session/leave - Leave the room

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
