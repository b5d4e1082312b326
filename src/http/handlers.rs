use super::state::AppState;
use crate::errors::SignalingError;
use crate::services::document_file_name;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryDocumentRequest {
    /// Summary text to render; the backend summarizes when omitted
    pub summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn signaling_error_response(e: SignalingError) -> Response {
    let status = match e {
        SignalingError::RecorderBusy(_) | SignalingError::NotRecorder(_) => StatusCode::CONFLICT,
        SignalingError::SessionClosed => StatusCode::GONE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /session
/// Status of the room session
pub async fn get_session_status(State(state): State<AppState>) -> Response {
    match state.session.status().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => signaling_error_response(e),
    }
}

/// GET /session/transcript
/// Transcript as currently shown to this participant
pub async fn get_transcript(State(state): State<AppState>) -> Response {
    match state.session.transcript().await {
        Ok(transcript) => (StatusCode::OK, Json(transcript)).into_response(),
        Err(e) => signaling_error_response(e),
    }
}

/// POST /session/recording/start
/// Claim the recorder role for this participant
pub async fn start_recording(State(state): State<AppState>) -> Response {
    info!("Recording start requested for room {}", state.room);

    match state.session.start_recording().await {
        Ok(()) => (
            StatusCode::OK,
            Json(RecordingResponse {
                status: "recording".to_string(),
                message: format!("Recording started in room {}", state.room),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to start recording: {}", e);
            signaling_error_response(e)
        }
    }
}

/// POST /session/recording/stop
/// Finalize the transcript and release the recorder role
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    info!("Recording stop requested for room {}", state.room);

    match state.session.stop_recording().await {
        Ok(()) => (
            StatusCode::OK,
            Json(RecordingResponse {
                status: "stopped".to_string(),
                message: "Recording stopped".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("Failed to stop recording: {}", e);
            signaling_error_response(e)
        }
    }
}

/// POST /session/summary
/// Summarize the room's persisted transcripts
pub async fn summarize_room(State(state): State<AppState>) -> Response {
    match state.summaries.summarize(state.room.as_str()).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => {
            error!("Failed to summarize room {}: {:#}", state.room, e);
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to summarize room: {}", e),
            )
        }
    }
}

/// POST /session/summary/document
/// Render a summary document and return it as a download
pub async fn download_summary_document(
    State(state): State<AppState>,
    body: Option<Json<SummaryDocumentRequest>>,
) -> Response {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    match state
        .summaries
        .render_document(state.room.as_str(), request.summary.as_deref())
        .await
    {
        Ok(document) => {
            let file_name = document_file_name(state.room.as_str(), chrono::Utc::now());
            info!("Serving summary document {} ({} bytes)", file_name, document.len());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/pdf".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", file_name),
                    ),
                ],
                document,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to render summary document: {:#}", e);
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to render summary document: {}", e),
            )
        }
    }
}

/// POST /session/leave
/// Leave the room
pub async fn leave_room(State(state): State<AppState>) -> Response {
    match state.session.leave().await {
        Ok(()) => (
            StatusCode::OK,
            Json(RecordingResponse {
                status: "left".to_string(),
                message: format!("Left room {}", state.room),
            }),
        )
            .into_response(),
        Err(e) => signaling_error_response(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
