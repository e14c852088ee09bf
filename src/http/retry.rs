//! Error taxonomy and retry classification for issue tracker requests.

/// Maximum number of send attempts per request inside the transport.
pub const NUM_REQUEST_RETRIES: usize = 3;

/// Delay between transient retry attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Terminal issue tracker failures, classified from the remote response.
#[derive(Debug)]
pub enum TrackerError {
    /// The issue does not exist (HTTP 404).
    NotFound(String),
    /// The caller lacks authorization (HTTP 403).
    PermissionDenied(String),
    /// Any other remote error.
    Other(String),
    /// Ambient default credentials could not be resolved.
    CredentialsUnavailable(String),
    /// The access token was rejected again after rebuilding the connection.
    RetriesExhausted(String),
}

impl TrackerError {
    /// Classify a terminal HTTP error status, preserving the response text.
    pub fn from_status(status: u16, text: String) -> Self {
        match status {
            404 => TrackerError::NotFound(text),
            403 => TrackerError::PermissionDenied(text),
            _ => TrackerError::Other(text),
        }
    }
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::NotFound(msg) => {
                write!(f, "Issue not found: {}", msg)
            }
            TrackerError::PermissionDenied(msg) => {
                write!(f, "Permission denied: {}", msg)
            }
            TrackerError::Other(msg) => {
                write!(f, "Issue tracker error: {}", msg)
            }
            TrackerError::CredentialsUnavailable(msg) => {
                write!(f, "No application default credentials: {}", msg)
            }
            TrackerError::RetriesExhausted(msg) => {
                write!(f, "Access token rejected after rebuilding the connection: {}", msg)
            }
        }
    }
}

impl std::error::Error for TrackerError {}

/// An HTTP error response surfaced by the transport, before classification.
#[derive(Debug)]
pub struct StatusError {
    pub status: u16,
    pub body: String,
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.body)
    }
}

impl std::error::Error for StatusError {}

/// Whether a response status is worth retrying inside the transport.
/// Server errors are transient; every client error surfaces immediately.
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500
}

/// Checks whether an error may be retried by the transport's inner loop.
/// Anything that is not a terminal HTTP status (connection resets,
/// timeouts, DNS failures) is considered transient.
pub fn is_retryable_error(e: &anyhow::Error) -> bool {
    match e.downcast_ref::<StatusError>() {
        Some(status) => is_retryable_status(status.status),
        None => true,
    }
}
