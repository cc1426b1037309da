//! Identity provider abstraction.
//!
//! The agency service does not own user accounts. Sessions live in an
//! external identity provider; this module defines the seam the rest of the
//! service talks through, plus the credential bundle extracted from
//! incoming requests.

pub mod http;
pub mod static_provider;

pub use http::HttpIdentityProvider;
pub use static_provider::StaticIdentityProvider;

use crate::models::Role;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authenticated user as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Session material extracted from an incoming request.
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials {
    pub bearer_token: Option<String>,
    pub session_cookie: Option<String>,
}

impl SessionCredentials {
    /// Pull credentials out of request headers. Accepts either a bearer
    /// token or the configured session cookie.
    pub fn from_headers(headers: &HeaderMap, session_cookie_name: &str) -> Self {
        let bearer_token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let session_cookie = CookieJar::from_headers(headers)
            .get(session_cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty());

        Self {
            bearer_token,
            session_cookie,
        }
    }

    /// No credential material at all. Requests in this state can be routed
    /// without ever consulting the provider.
    pub fn is_empty(&self) -> bool {
        self.bearer_token.is_none() && self.session_cookie.is_none()
    }

    /// The token to present to the provider. A bearer token wins over the
    /// session cookie when both are present.
    pub fn token(&self) -> Option<&str> {
        self.bearer_token
            .as_deref()
            .or(self.session_cookie.as_deref())
    }
}

/// Errors from the identity provider boundary.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Request(String),
    #[error("identity provider returned status {status}")]
    Upstream { status: u16 },
    #[error("identity provider response could not be decoded: {0}")]
    Decode(String),
}

/// External identity provider operations used by the agency service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the identity behind the given session credentials.
    ///
    /// `Ok(None)` means the credentials do not map to a live session, which
    /// is an expected outcome and not an error.
    async fn current_identity(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Option<Identity>, IdentityError>;

    /// Push the member's role into the provider's user metadata so other
    /// surfaces can read it without a round trip to this service.
    async fn update_role_metadata(&self, user_id: &str, role: Role) -> Result<(), IdentityError>;
}
