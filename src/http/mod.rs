//! Authorized HTTP transport with retry logic and error classification.

mod retry;
mod transport;

pub use retry::{
    NUM_REQUEST_RETRIES, RETRY_DELAY_MS, StatusError, TrackerError, is_retryable_error,
    is_retryable_status,
};
pub use transport::{REQUEST_TIMEOUT, Transport};
