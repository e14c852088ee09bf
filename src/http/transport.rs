//! Authorized HTTP transport with built-in retry for transient failures.

use anyhow::{Context, Result};
use log::{debug, error, warn};
use reqwest::{
    Client, Method,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde_json::Value;
use std::time::Duration;

use crate::auth::CredentialsProvider;

use super::retry::{NUM_REQUEST_RETRIES, RETRY_DELAY_MS, StatusError, is_retryable_error};

/// Timeout applied to every request on the transport.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "bugz-client";

/// An HTTP client bound to a bearer token for one OAuth2 scope.
///
/// The token is fixed for the transport's lifetime; on auth expiry the
/// owner rebuilds the whole transport rather than mutating it.
#[derive(Clone, Debug)]
pub struct Transport {
    client: Client,
}

impl Transport {
    /// Builds a transport authorized for the given scope.
    ///
    /// An empty scope is a programming error and panics. Missing ambient
    /// credentials are a runtime failure reported as
    /// [`TrackerError::CredentialsUnavailable`](super::TrackerError::CredentialsUnavailable).
    pub async fn build<P: CredentialsProvider + ?Sized>(
        provider: &P,
        scope: &str,
        timeout: Duration,
    ) -> Result<Self> {
        assert!(!scope.is_empty(), "transport scope must not be empty");

        let token = match provider.access_token(scope).await {
            Ok(token) => token,
            Err(e) => {
                error!("Error when getting the application default credentials: {}", e);
                return Err(super::TrackerError::CredentialsUnavailable(e.to_string()).into());
            }
        };
        debug!("Authorizing transport with token {}", token.masked());

        let mut headers = HeaderMap::new();
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token.secret()))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Sends a JSON request, retrying transient failures.
    /// Client-error statuses surface immediately as [`StatusError`].
    #[tracing::instrument(skip(self, body))]
    pub async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let mut last_error = None;

        for attempt in 1..=NUM_REQUEST_RETRIES {
            match self.send_once(method.clone(), url, body).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable_error(&e) {
                        debug!("{} {}: non-retryable error: {}", method, url, e);
                        return Err(e);
                    }

                    if attempt < NUM_REQUEST_RETRIES {
                        warn!(
                            "{} {}: attempt {}/{} failed ({}), retrying in {}ms...",
                            method, url, attempt, NUM_REQUEST_RETRIES, e, RETRY_DELAY_MS
                        );
                        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow::anyhow!(
                "{} {}: failed after {} attempts",
                method,
                url,
                NUM_REQUEST_RETRIES
            )
        }))
    }

    /// Single send attempt without retry.
    pub(crate) async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        debug!("{} {}...", method, url);

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StatusError {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        // Some mutating calls answer with an empty body.
        let text = response
            .text()
            .await
            .context("Failed to read response body")?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).context("Failed to parse JSON response")
    }
}
