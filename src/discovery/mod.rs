//! Service stub construction from the API discovery document.

mod stub;

use anyhow::Result;
use log::warn;
use reqwest::Method;

use crate::http::Transport;

pub use stub::{PreparedRequest, ServiceStub};

/// Discovery document for the public issue tracker API.
pub const DISCOVERY_URL: &str =
    "https://issuetracker.googleapis.com/$discovery/rest?version=v1&labels=GOOGLE_PUBLIC";

/// Number of sequential discovery attempts before construction fails.
pub const MAX_DISCOVERY_RETRIES: usize = 3;

/// Fetches the discovery document and builds a callable stub.
///
/// Up to [`MAX_DISCOVERY_RETRIES`] attempts, no backoff; the first success
/// stops the loop, and after the final attempt the last fetch error
/// propagates as a fatal construction failure. A document that fetches but
/// does not parse is not retried.
#[tracing::instrument(skip(transport))]
pub async fn build_stub(transport: &Transport, discovery_url: &str) -> Result<ServiceStub> {
    let mut last_error = None;

    for attempt in 1..=MAX_DISCOVERY_RETRIES {
        match transport.send_once(Method::GET, discovery_url, None).await {
            Ok(document) => return ServiceStub::from_document(document),
            Err(e) => {
                warn!(
                    "Discovery attempt #{}/{}: {}",
                    attempt, MAX_DISCOVERY_RETRIES, e
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("no discovery attempt was made"))
        .context(format!(
            "Service discovery failed after {} attempts",
            MAX_DISCOVERY_RETRIES
        )))
}
