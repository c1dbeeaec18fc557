//! User configs fetched from the config service

use crate::blocking::{Result, UserConfigSource};
use crate::config::UserConfig;
use async_trait::async_trait;
use fuzzly_client::{GatewayClient, GatewayRequest, Service};

/// [`UserConfigSource`] backed by `GET /i1/user/{user_id}` on the config service
#[derive(Debug, Clone)]
pub struct ConfigGateway {
    client: GatewayClient,
    token: Option<String>,
}

impl ConfigGateway {
    /// Create a source using `client`
    pub fn new(client: GatewayClient) -> Self {
        Self { client, token: None }
    }

    /// Authenticate requests with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl UserConfigSource for ConfigGateway {
    async fn user_config(&self, user_id: u64) -> Result<Option<UserConfig>> {
        let mut request = GatewayRequest::get(format!("/i1/user/{}", user_id));
        if let Some(token) = &self.token {
            request = request.bearer(token);
        }

        match self.client.send::<UserConfig>(Service::Config, request).await {
            Ok(response) => Ok(Some(response.data)),
            Err(e) if e.is_not_found() => {
                tracing::debug!(user_id, "no stored user config");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
