//! Application-default credential resolution.
//!
//! Tokens come from one of two ambient sources, tried in order:
//! an explicit token in `GOOGLE_OAUTH_ACCESS_TOKEN`, then the GCE
//! metadata server's token endpoint scoped to the requested scope.
//! No credential file path is accepted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::env;

use super::{AccessToken, CredentialsProvider};

/// Environment variable holding an explicit bearer token.
pub const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// GCE metadata server endpoint for the default service account's token.
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Resolves ambient application-default credentials.
pub struct AdcCredentials {
    client: Client,
    metadata_url: String,
}

impl AdcCredentials {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            metadata_url: METADATA_TOKEN_URL.to_string(),
        }
    }

    /// Create with a custom metadata endpoint. Used primarily for testing.
    #[cfg(test)]
    pub fn with_metadata_url(metadata_url: &str) -> Self {
        Self {
            client: Client::new(),
            metadata_url: metadata_url.to_string(),
        }
    }

    async fn metadata_token(&self, scope: &str) -> Result<AccessToken> {
        #[derive(serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        debug!("Requesting token from metadata server for scope {}...", scope);

        let response = self
            .client
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .query(&[("scopes", scope)])
            .send()
            .await
            .context("Failed to reach the metadata server")?;

        let response = response
            .error_for_status()
            .context("Metadata server refused the token request")?;

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse metadata token response")?;

        Ok(AccessToken::new(token.access_token))
    }
}

impl Default for AdcCredentials {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialsProvider for AdcCredentials {
    #[tracing::instrument(skip(self))]
    async fn access_token(&self, scope: &str) -> Result<AccessToken> {
        if let Ok(secret) = env::var(TOKEN_ENV) {
            let token = AccessToken::new(secret);
            debug!("Using {} for authentication: {}", TOKEN_ENV, token.masked());
            return Ok(token);
        }

        self.metadata_token(scope).await
    }
}
