//! Backend collaborators reached over HTTP
//!
//! - ICE server configuration (`GET /config`)
//! - transcript persistence (`POST /transcripts`)
//! - room summaries and summary documents (`POST /summaries/room/{room}[/pdf]`)

pub mod ice;
pub mod summaries;
pub mod transcripts;

use anyhow::{bail, Context, Result};
use reqwest::{Client, Url};
use std::time::Duration;

pub use ice::{default_ice_servers, IceConfigProvider};
pub use summaries::{document_file_name, RoomSummary, SummaryService};
pub use transcripts::{TranscriptRecord, TranscriptStore};

/// HTTP client for the backend service
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;

        let base_url = base_url.into();
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid backend URL {}", base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Backend URL {} cannot carry a path", base_url);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Endpoint below the base URL; each segment is percent-encoded
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Turn a non-success status into an error carrying the response body
async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("{} failed with {}: {}", what, status, body.trim())
}
