use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ensure_success, BackendClient};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
struct DocumentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
}

/// Summarization of a room's persisted transcripts
#[async_trait]
pub trait SummaryService: Send + Sync {
    async fn summarize(&self, room: &str) -> Result<RoomSummary>;

    /// Render a summary document; the backend summarizes when `summary` is None
    async fn render_document(&self, room: &str, summary: Option<&str>) -> Result<Vec<u8>>;
}

#[async_trait]
impl SummaryService for BackendClient {
    async fn summarize(&self, room: &str) -> Result<RoomSummary> {
        info!("Requesting summary for room {}", room);

        let response = self
            .client
            .post(self.url(&["summaries", "room", room]))
            .send()
            .await
            .context("Summary request failed")?;
        let response = ensure_success(response, "Summary request").await?;

        response
            .json()
            .await
            .context("Failed to parse summary response")
    }

    async fn render_document(&self, room: &str, summary: Option<&str>) -> Result<Vec<u8>> {
        info!("Requesting summary document for room {}", room);

        let summary = summary.map(str::trim).filter(|s| !s.is_empty());
        let response = self
            .client
            .post(self.url(&["summaries", "room", room, "pdf"]))
            .json(&DocumentRequest { summary })
            .send()
            .await
            .context("Summary document request failed")?;
        let response = ensure_success(response, "Summary document request").await?;

        let bytes = response
            .bytes()
            .await
            .context("Failed to read summary document")?;
        Ok(bytes.to_vec())
    }
}

/// Download name for a room summary document
pub fn document_file_name(room: &str, at: DateTime<Utc>) -> String {
    format!("room-summary-{}-{}.pdf", room, at.format("%Y%m%d-%H%M"))
}
