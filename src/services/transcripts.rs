use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{ensure_success, BackendClient};

/// One persisted chunk of finalized transcript text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptRecord {
    pub room: String,
    pub client_id: String,
    pub language: String,
    pub text: String,
}

/// Durable transcript storage
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn save(&self, record: TranscriptRecord) -> Result<()>;
}

#[async_trait]
impl TranscriptStore for BackendClient {
    async fn save(&self, record: TranscriptRecord) -> Result<()> {
        let response = self
            .client
            .post(self.url(&["transcripts"]))
            .json(&record)
            .send()
            .await
            .context("Transcript save request failed")?;
        ensure_success(response, "Transcript save").await?;

        debug!(
            "Saved {} chars of transcript for room {}",
            record.text.len(),
            record.room
        );
        Ok(())
    }
}
