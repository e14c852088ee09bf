//! Credential resolution for the issue tracker client.
//!
//! Credentials are resolved through the [`CredentialsProvider`] capability,
//! injected into the tracker at construction time. The production
//! implementation ([`AdcCredentials`]) resolves ambient application-default
//! credentials; tests inject a mock.

mod adc;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

pub use adc::AdcCredentials;

/// OAuth2 scope granting access to the caller's email identity.
pub const EMAIL_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.email";

/// OAuth2 scope granting access to Buganizer issue operations.
pub const BUGANIZER_SCOPE: &str = "https://www.googleapis.com/auth/buganizer";

/// A bearer token resolved from ambient credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw bearer secret. Never log this directly; use [`AccessToken::masked`].
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// A redacted rendering safe for logs.
    pub fn masked(&self) -> String {
        if self.0.len() > 12 {
            format!("{}*********{}", &self.0[..4], &self.0[self.0.len() - 4..])
        } else {
            "*********".to_string()
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({})", self.masked())
    }
}

/// Capability for resolving bearer tokens for an OAuth2 scope.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Resolve a bearer token valid for the given scope.
    async fn access_token(&self, scope: &str) -> Result<AccessToken>;
}
