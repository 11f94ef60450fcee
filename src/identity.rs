//! Bearer-token identity via an OAuth 2.0 provider.
//!
//! The provider issues access tokens through the authorization-code flow;
//! a token is verified by fetching the profile it belongs to. The profile's
//! `username` becomes the user id throughout the backend.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::config::OAuthConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid or expired access token")]
    InvalidToken,

    #[error("authorization code rejected: {0}")]
    CodeRejected(String),

    #[error("identity provider error ({status}): {body}")]
    Provider { status: u16, body: String },

    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid identity provider url: {0}")]
    Url(#[from] url::ParseError),
}

/// Resolves bearer tokens to identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError>;
}

/// Token endpoint reply.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Profile {
    username: String,
    #[serde(default)]
    email: String,
}

pub struct OAuthIdentity {
    client: Client,
    config: OAuthConfig,
}

impl OAuthIdentity {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Where to send the browser to start a login.
    pub fn authorize_url(&self) -> Result<Url, IdentityError> {
        let mut url = Url::parse(&self.config.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("scope", "profile")
            .append_pair("redirect_uri", &self.config.redirect_uri);
        Ok(url)
    }

    /// Trade an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, IdentityError> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let resp = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(IdentityError::CodeRejected(text));
        }
        if !status.is_success() {
            return Err(IdentityError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| IdentityError::Provider {
            status: status.as_u16(),
            body: format!("unreadable token response: {}", e),
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuthIdentity {
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError> {
        let resp = self
            .client
            .get(&self.config.profile_url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IdentityError::InvalidToken);
        }
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(IdentityError::Provider {
                status: status.as_u16(),
                body: text,
            });
        }

        let profile: Profile = serde_json::from_str(&text).map_err(|e| IdentityError::Provider {
            status: status.as_u16(),
            body: format!("unreadable profile: {}", e),
        })?;
        tracing::debug!(user_id = %profile.username, "verified access token");
        Ok(Identity {
            user_id: profile.username,
            email: profile.email,
        })
    }
}
