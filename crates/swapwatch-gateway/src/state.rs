//! Shared handler state.

use std::sync::Arc;

use swapwatch_client::UpstreamClient;

use crate::config::GatewayConfig;

/// State shared by all relay handlers.
#[derive(Clone)]
pub struct GatewayState {
    client: Arc<UpstreamClient>,
    config: GatewayConfig,
}

impl GatewayState {
    pub fn new(client: Arc<UpstreamClient>, config: GatewayConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &UpstreamClient {
        &self.client
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
