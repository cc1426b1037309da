//! HTTP client for the external identity provider.

use crate::config::IdentityConfig;
use crate::identity::{Identity, IdentityError, IdentityProvider, SessionCredentials};
use crate::models::Role;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use service_core::observability::TracedClientExt;

/// Identity provider backed by an HTTP session service.
pub struct HttpIdentityProvider {
    client: Client,
    config: IdentityConfig,
}

impl HttpIdentityProvider {
    pub fn new(config: IdentityConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn current_identity(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Option<Identity>, IdentityError> {
        let Some(token) = credentials.token() else {
            return Ok(None);
        };

        let url = format!("{}/v1/sessions/current", self.config.base_url);
        let response = self
            .client
            .traced_get(&url)
            .bearer_auth(token)
            .header("x-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send GET request to {}: {}", url, e);
                IdentityError::Request(e.to_string())
            })?;

        match response.status() {
            StatusCode::OK => {
                let identity = response
                    .json::<Identity>()
                    .await
                    .map_err(|e| IdentityError::Decode(e.to_string()))?;
                Ok(Some(identity))
            }
            // Dead or unknown sessions are a normal outcome, not a failure.
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(None),
            status => Err(IdentityError::Upstream {
                status: status.as_u16(),
            }),
        }
    }

    async fn update_role_metadata(&self, user_id: &str, role: Role) -> Result<(), IdentityError> {
        let url = format!("{}/v1/users/{}/metadata", self.config.base_url, user_id);
        let response = self
            .client
            .traced_post(&url)
            .header("x-api-key", &self.config.api_key)
            .json(&json!({ "role": role.as_str() }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                IdentityError::Request(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(IdentityError::Upstream {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}
