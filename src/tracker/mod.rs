//! Issue tracker manager: connection lifecycle, request execution, and the
//! issue operations built on top.

mod issue;

use anyhow::{Context, Result};
use log::{debug, error, warn};
use reqwest::Url;
use serde_json::{Value, json};
use std::time::Duration;

use crate::auth::{BUGANIZER_SCOPE, CredentialsProvider};
use crate::discovery::{self, DISCOVERY_URL, PreparedRequest, ServiceStub};
use crate::http::{REQUEST_TIMEOUT, StatusError, TrackerError, Transport};

pub use issue::{Issue, IssueAccessLevel, LabelStore};

/// Web URL prefix for issues, used by the URL helpers.
pub const ISSUE_TRACKER_URL: &str = "https://issuetracker.googleapis.com/v1/issues";

/// Configuration for an issue tracker connection.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Discovery document URL (overridable for testing).
    pub discovery_url: String,
    /// OAuth2 scope the transport is authorized for.
    pub scope: String,
    /// Transport-level request timeout.
    pub timeout: Duration,
    /// Component that newly filed issues land in.
    pub default_component_id: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            discovery_url: DISCOVERY_URL.to_string(),
            scope: BUGANIZER_SCOPE.to_string(),
            timeout: REQUEST_TIMEOUT,
            default_component_id: 0,
        }
    }
}

/// One live transport/stub pair. Replaced wholesale on re-authentication,
/// never mutated field by field.
struct Connection {
    transport: Transport,
    stub: ServiceStub,
}

/// Authenticated client for the issue tracker.
///
/// Holds a single live connection; intended for one logical caller at a
/// time, so mutating operations take `&mut self`.
pub struct IssueTracker<P> {
    provider: P,
    config: TrackerConfig,
    conn: Connection,
}

impl<P: CredentialsProvider> IssueTracker<P> {
    /// Authorizes a transport and discovers the service stub.
    ///
    /// Fails with [`TrackerError::CredentialsUnavailable`] when no ambient
    /// credentials resolve, or with a discovery construction error after
    /// the retry budget is spent.
    #[tracing::instrument(skip(provider, config))]
    pub async fn connect(provider: P, config: TrackerConfig) -> Result<Self> {
        let conn = open_connection(&provider, &config).await?;
        Ok(Self {
            provider,
            config,
            conn,
        })
    }

    /// The discovered RPC surface, for preparing requests directly.
    pub fn stub(&self) -> &ServiceStub {
        &self.conn.stub
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.conn = open_connection(&self.provider, &self.config).await?;
        Ok(())
    }

    /// Executes a prepared request.
    ///
    /// A rejected access token triggers one rebuild of the transport and
    /// stub followed by one re-send; a second rejection surfaces as
    /// [`TrackerError::RetriesExhausted`]. Other HTTP failures map onto the
    /// [`TrackerError`] taxonomy; non-HTTP failures propagate unchanged.
    #[tracing::instrument(skip(self, request), fields(method = %request.method_id))]
    pub async fn execute(&mut self, request: &PreparedRequest) -> Result<Value> {
        let mut rebuilt = false;
        loop {
            let result = self
                .conn
                .transport
                .send(
                    request.http_method.clone(),
                    &request.url,
                    request.body.as_ref(),
                )
                .await;
            let e = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            let Some(status) = e.downcast_ref::<StatusError>() else {
                return Err(e);
            };
            match status.status {
                401 if !rebuilt => {
                    warn!("Access token rejected, rebuilding transport and stub");
                    self.reconnect().await?;
                    rebuilt = true;
                }
                401 => {
                    return Err(TrackerError::RetriesExhausted(status.body.clone()).into());
                }
                code => return Err(TrackerError::from_status(code, e.to_string()).into()),
            }
        }
    }

    /// Creates an unsaved issue targeting the configured component.
    pub fn new_issue(&self) -> Issue {
        Issue::new_issue(self.config.default_component_id)
    }

    /// Gets an issue by id. A missing issue and classified retrieval
    /// failures return `None`; transport-level failures propagate.
    #[tracing::instrument(skip(self))]
    pub async fn get_issue(&mut self, issue_id: &str) -> Result<Option<Issue>> {
        let request =
            self.conn
                .stub
                .prepare("issuetracker.issues.get", &[("issueId", issue_id)], None)?;
        match self.execute(&request).await {
            Ok(data) => Ok(Some(Issue::existing(data))),
            Err(e) => match e.downcast_ref::<TrackerError>() {
                Some(TrackerError::NotFound(_)) => Ok(None),
                Some(_) => {
                    error!("Failed to retrieve issue {}: {}", issue_id, e);
                    Ok(None)
                }
                None => Err(e),
            },
        }
    }

    /// Saves an issue: files it if new, otherwise sends a masked update
    /// plus one hotlist membership call per added and removed hotlist.
    #[tracing::instrument(skip(self, issue, new_comment))]
    pub async fn save(
        &mut self,
        issue: &mut Issue,
        new_comment: Option<&str>,
        notify: bool,
    ) -> Result<()> {
        if issue.is_new() {
            debug!("Creating new issue..");
            let request = self.conn.stub.prepare(
                "issuetracker.issues.create",
                &[("templateOptions.applyTemplate", "true")],
                Some(issue.create_body()),
            )?;
            let result = self.execute(&request).await?;
            issue.apply_saved(result);
            return Ok(());
        }

        debug!("Updating issue..");
        let issue_id = issue
            .id()
            .context("Cannot update an issue without an id")?
            .to_string();

        let (body, has_changes) = issue.update_body(new_comment, notify);
        let mut result = Value::Null;
        if has_changes {
            let request = self.conn.stub.prepare(
                "issuetracker.issues.modify",
                &[("issueId", &issue_id)],
                Some(body),
            )?;
            result = self.execute(&request).await?;
        }

        for hotlist in issue.labels().added().to_vec() {
            let request = self.conn.stub.prepare(
                "issuetracker.hotlists.createEntries",
                &[("hotlistId", &hotlist)],
                Some(json!({"hotlistEntry": {"issueId": &issue_id}})),
            )?;
            self.execute(&request).await?;
        }
        for hotlist in issue.labels().removed().to_vec() {
            let request = self.conn.stub.prepare(
                "issuetracker.hotlists.entries.delete",
                &[("hotlistId", &hotlist), ("issueId", &issue_id)],
                None,
            )?;
            self.execute(&request).await?;
        }

        issue.apply_saved(result);
        Ok(())
    }

    /// Posts the canned smoke-test comment to an issue.
    #[tracing::instrument(skip(self))]
    pub async fn add_comment(&mut self, issue_id: &str) -> Result<Value> {
        let request = self.conn.stub.prepare(
            "issuetracker.issues.modify",
            &[("issueId", issue_id)],
            Some(issue::comment_update("test comment")),
        )?;
        self.execute(&request).await
    }

    /// Finds issues matching the keywords. Returns the first page only.
    #[tracing::instrument(skip(self))]
    pub async fn find_issues(&mut self, keywords: &[&str], only_open: bool) -> Result<Vec<Issue>> {
        let query = search_query(keywords, only_open);
        let request =
            self.conn
                .stub
                .prepare("issuetracker.issues.list", &[("query", &query)], None)?;
        let result = self.execute(&request).await?;
        let issues = result
            .get("issues")
            .and_then(Value::as_array)
            .map(|issues| issues.iter().cloned().map(Issue::existing).collect())
            .unwrap_or_default();
        Ok(issues)
    }

    /// The issue's first comment, if the first update carries one.
    #[tracing::instrument(skip(self))]
    pub async fn issue_body(&mut self, issue_id: &str) -> Result<Option<String>> {
        let request = self.conn.stub.prepare(
            "issuetracker.issues.issueUpdates.list",
            &[("issueId", issue_id), ("pageSize", "1"), ("sortBy", "ASC")],
            None,
        )?;
        let result = self.execute(&request).await?;
        let Some(update) = result
            .get("issueUpdates")
            .and_then(Value::as_array)
            .and_then(|updates| updates.first())
        else {
            return Ok(None);
        };
        if update.get("commentNumber").and_then(Value::as_i64) != Some(1) {
            return Ok(None);
        }
        Ok(update
            .pointer("/issueComment/comment")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

async fn open_connection<P: CredentialsProvider + ?Sized>(
    provider: &P,
    config: &TrackerConfig,
) -> Result<Connection> {
    let transport = Transport::build(provider, &config.scope, config.timeout).await?;
    let stub = discovery::build_stub(&transport, &config.discovery_url).await?;
    Ok(Connection { transport, stub })
}

/// Web URL for an issue.
pub fn issue_url(issue_id: &str) -> String {
    format!("{}/{}", ISSUE_TRACKER_URL, issue_id)
}

/// Web URL listing issues matching the keywords.
pub fn find_issues_url(keywords: &[&str], only_open: bool) -> String {
    let mut url = Url::parse(ISSUE_TRACKER_URL).expect("static URL is valid");
    url.query_pairs_mut()
        .append_pair("q", &search_query(keywords, only_open));
    url.to_string()
}

fn search_query(keywords: &[&str], only_open: bool) -> String {
    let mut query = keywords
        .iter()
        .map(|keyword| format!("\"{}\"", keyword))
        .collect::<Vec<_>>()
        .join(" ");
    if only_open {
        query.push_str(" status:open");
    }
    query
}
