use std::time::Duration;

use loop_kernel::types::{HandshakeAck, NodeDescriptor};
use loop_kernel::RelayEnvelope;
use reqwest::Client;

use crate::errors::LoopError;

/// Outbound calls to a peer node's federation endpoints.
#[derive(Debug, Clone)]
pub struct PeerClient {
    client: Client,
    api_key: Option<String>,
}

impl PeerClient {
    pub fn new(timeout: Duration, api_key: Option<String>) -> Result<Self, LoopError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_key })
    }

    pub async fn handshake(&self, base_url: &str, local: &NodeDescriptor) -> Result<HandshakeAck, LoopError> {
        let url = format!("{}/api/federation/handshake", base_url.trim_end_matches('/'));
        let resp = self.authorized(self.client.post(&url)).json(local).send().await?;

        if !resp.status().is_success() {
            return Err(LoopError::Network(format!("Handshake with {} failed: {}", base_url, resp.status())));
        }

        Ok(resp.json().await?)
    }

    pub async fn relay(&self, base_url: &str, envelope: &RelayEnvelope) -> Result<(), LoopError> {
        let url = format!("{}/api/loop/relay", base_url.trim_end_matches('/'));
        let resp = self.authorized(self.client.post(&url)).json(envelope).send().await?;

        if !resp.status().is_success() {
            return Err(LoopError::Network(format!("Relay to {} failed: {}", base_url, resp.status())));
        }

        Ok(())
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }
}
