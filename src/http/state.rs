use crate::services::SummaryService;
use crate::session::SessionHandle;
use crate::signaling::RoomId;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Handle to the running room session
    pub session: SessionHandle,

    /// Summarization backend
    pub summaries: Arc<dyn SummaryService>,

    pub room: RoomId,
}

impl AppState {
    pub fn new(session: SessionHandle, summaries: Arc<dyn SummaryService>, room: RoomId) -> Self {
        Self {
            session,
            summaries,
            room,
        }
    }
}
