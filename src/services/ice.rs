use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::{ensure_success, BackendClient};
use crate::engine::IceServer;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RtcConfigResponse {
    ice_servers: Vec<IceServer>,
}

/// Public STUN servers used when the backend offers nothing usable
pub fn default_ice_servers() -> Vec<IceServer> {
    vec![
        IceServer::stun("stun:stun.l.google.com:19302"),
        IceServer::stun("stun:stun1.l.google.com:19302"),
    ]
}

/// Fetches the ICE server list once per session and caches it
pub struct IceConfigProvider {
    backend: BackendClient,
    cached: OnceCell<Vec<IceServer>>,
}

impl IceConfigProvider {
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            cached: OnceCell::new(),
        }
    }

    /// ICE servers for new peer connections; never fails
    pub async fn ice_servers(&self) -> Vec<IceServer> {
        self.cached
            .get_or_init(|| async {
                match self.fetch().await {
                    Ok(servers) if !servers.is_empty() => {
                        info!("Loaded {} ICE servers from backend", servers.len());
                        servers
                    }
                    Ok(_) => {
                        warn!("Backend returned no ICE servers, using defaults");
                        default_ice_servers()
                    }
                    Err(e) => {
                        warn!("Failed to load ICE config, using defaults: {:#}", e);
                        default_ice_servers()
                    }
                }
            })
            .await
            .clone()
    }

    async fn fetch(&self) -> Result<Vec<IceServer>> {
        let response = self
            .backend
            .client
            .get(self.backend.url(&["config"]))
            .send()
            .await
            .context("ICE config request failed")?;
        let response = ensure_success(response, "ICE config request").await?;
        let config: RtcConfigResponse = response
            .json()
            .await
            .context("Failed to parse ICE config")?;
        Ok(config.ice_servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_response_shape() {
        let json = r#"{"iceServers":[
            {"urls":"stun:stun.example.org:3478"},
            {"urls":"turn:turn.example.org:3478","username":"u","credential":"p"}
        ]}"#;
        let config: RtcConfigResponse = serde_json::from_str(json).unwrap();
        assert_eq!(config.ice_servers.len(), 2);
        assert_eq!(config.ice_servers[1].username.as_deref(), Some("u"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_falls_back_to_public_stun() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let backend = BackendClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let provider = IceConfigProvider::new(backend);

        assert_eq!(provider.ice_servers().await, default_ice_servers());
    }
}
