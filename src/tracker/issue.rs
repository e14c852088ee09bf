//! Issue state with change tracking for masked updates.
//!
//! An [`Issue`] carries the raw JSON the service returned plus bookkeeping
//! about what the caller changed since the last save. The tracker turns
//! that bookkeeping into an `issues.modify` body with `addMask`/`removeMask`
//! naming exactly the touched fields.

use serde_json::{Map, Value, json};
use std::collections::BTreeSet;

/// Statuses in which an issue counts as open.
const OPEN_STATUSES: [&str; 3] = ["NEW", "ASSIGNED", "ACCEPTED"];

/// Access level applied to newly filed issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IssueAccessLevel {
    #[default]
    LimitNone,
    LimitView,
    LimitAppend,
    LimitViewTrusted,
}

impl IssueAccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueAccessLevel::LimitNone => "LIMIT_NONE",
            IssueAccessLevel::LimitView => "LIMIT_VIEW",
            IssueAccessLevel::LimitAppend => "LIMIT_APPEND",
            IssueAccessLevel::LimitViewTrusted => "LIMIT_VIEW_TRUSTED",
        }
    }
}

/// A collection field tracking additions and removals since the last save.
#[derive(Debug, Clone, Default)]
pub struct LabelStore {
    items: Vec<String>,
    added: Vec<String>,
    removed: Vec<String>,
}

impl LabelStore {
    pub fn new<I: IntoIterator<Item = String>>(items: I) -> Self {
        Self {
            items: items.into_iter().collect(),
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Adds an item. Re-adding an item removed since the last save cancels
    /// the removal instead of recording a new addition.
    pub fn add(&mut self, item: &str) {
        if self.items.iter().any(|i| i == item) {
            return;
        }
        self.items.push(item.to_string());
        if let Some(pos) = self.removed.iter().position(|i| i == item) {
            self.removed.remove(pos);
        } else {
            self.added.push(item.to_string());
        }
    }

    pub fn remove(&mut self, item: &str) {
        let Some(pos) = self.items.iter().position(|i| i == item) else {
            return;
        };
        self.items.remove(pos);
        if let Some(pos) = self.added.iter().position(|i| i == item) {
            self.added.remove(pos);
        } else {
            self.removed.push(item.to_string());
        }
    }

    pub fn contains(&self, item: &str) -> bool {
        self.items.iter().any(|i| i == item)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn added(&self) -> &[String] {
        &self.added
    }

    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    pub(crate) fn reset_tracking(&mut self) {
        self.added.clear();
        self.removed.clear();
    }
}

/// A tracked issue: raw service state plus pending local changes.
#[derive(Debug, Clone)]
pub struct Issue {
    data: Value,
    is_new: bool,
    changed: BTreeSet<&'static str>,
    ccs: LabelStore,
    labels: LabelStore,
    body: Option<String>,
    access_limit: IssueAccessLevel,
}

impl Issue {
    /// Wraps issue state fetched from the service.
    pub(crate) fn existing(data: Value) -> Self {
        let ccs = LabelStore::new(
            data.pointer("/issueState/ccs")
                .and_then(Value::as_array)
                .map(|users| {
                    users
                        .iter()
                        .filter_map(|u| u.get("emailAddress"))
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default(),
        );
        let labels = LabelStore::new(
            data.pointer("/issueState/hotlistIds")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().map(hotlist_id_string).collect::<Vec<_>>())
                .unwrap_or_default(),
        );
        Self {
            data,
            is_new: false,
            changed: BTreeSet::new(),
            ccs,
            labels,
            body: None,
            access_limit: IssueAccessLevel::default(),
        }
    }

    /// An unsaved issue targeting the given component.
    pub(crate) fn new_issue(default_component_id: u64) -> Self {
        let data = json!({
            "issueState": {
                "componentId": default_component_id,
                "ccs": [],
                "hotlistIds": [],
                "accessLimit": {"accessLevel": IssueAccessLevel::default().as_str()},
            }
        });
        Self {
            data,
            is_new: true,
            changed: BTreeSet::new(),
            ccs: LabelStore::default(),
            labels: LabelStore::default(),
            body: None,
            access_limit: IssueAccessLevel::default(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// The raw issue state as last returned by the service.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn id(&self) -> Option<i64> {
        match self.data.get("issueId") {
            Some(Value::String(s)) => s.parse().ok(),
            Some(Value::Number(n)) => n.as_i64(),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.state_str("title")
    }

    pub fn set_title(&mut self, title: &str) {
        self.changed.insert("title");
        self.data["issueState"]["title"] = json!(title);
    }

    pub fn status(&self) -> Option<&str> {
        self.state_str("status")
    }

    pub fn set_status(&mut self, status: &str) {
        self.changed.insert("status");
        self.data["issueState"]["status"] = json!(status);
    }

    pub fn is_open(&self) -> bool {
        self.status()
            .is_some_and(|status| OPEN_STATUSES.contains(&status))
    }

    pub fn assignee(&self) -> Option<&str> {
        self.state_user("assignee")
    }

    pub fn set_assignee(&mut self, email: &str) {
        self.changed.insert("assignee");
        self.data["issueState"]["assignee"] = make_user(email);
    }

    pub fn clear_assignee(&mut self) {
        self.changed.insert("assignee");
        if let Some(state) = self.data["issueState"].as_object_mut() {
            state.remove("assignee");
        }
    }

    pub fn reporter(&self) -> Option<&str> {
        self.state_user("reporter")
    }

    pub fn set_reporter(&mut self, email: &str) {
        self.changed.insert("reporter");
        self.data["issueState"]["reporter"] = make_user(email);
    }

    /// Issue type used when filing; defaults to BUG.
    pub fn set_issue_type(&mut self, issue_type: &str) {
        self.data["issueState"]["type"] = json!(issue_type);
    }

    pub fn set_priority(&mut self, priority: &str) {
        self.data["issueState"]["priority"] = json!(priority);
    }

    /// Description text, attached as the first comment when filing.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn set_body(&mut self, body: &str) {
        self.body = Some(body.to_string());
    }

    pub fn ccs(&self) -> &LabelStore {
        &self.ccs
    }

    pub fn ccs_mut(&mut self) -> &mut LabelStore {
        &mut self.ccs
    }

    /// Hotlist ids this issue belongs to.
    pub fn labels(&self) -> &LabelStore {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut LabelStore {
        &mut self.labels
    }

    pub fn set_access_limit(&mut self, access_limit: IssueAccessLevel) {
        self.access_limit = access_limit;
        self.data["issueState"]["accessLimit"] = json!({"accessLevel": access_limit.as_str()});
    }

    fn state_str(&self, field: &str) -> Option<&str> {
        self.data
            .pointer(&format!("/issueState/{}", field))
            .and_then(Value::as_str)
    }

    fn state_user(&self, field: &str) -> Option<&str> {
        self.data
            .pointer(&format!("/issueState/{}/emailAddress", field))
            .and_then(Value::as_str)
    }

    /// The `issues.create` body for a new issue.
    pub(crate) fn create_body(&self) -> Value {
        let mut data = self.data.clone();
        let state = &mut data["issueState"];
        if state.get("type").is_none() {
            state["type"] = json!("BUG");
        }
        state["ccs"] = make_users(self.ccs.iter());
        state["hotlistIds"] = json!(
            self.labels
                .iter()
                .filter_map(|l| l.parse::<i64>().ok())
                .collect::<Vec<_>>()
        );
        state["accessLimit"] = json!({"accessLevel": self.access_limit.as_str()});
        if let Some(body) = &self.body {
            data["issueComment"] = json!({"comment": body});
        }
        data
    }

    /// The `issues.modify` body for pending changes. The second element is
    /// false when there is nothing to send (no field changes, no comment).
    /// Hotlist membership is not part of this body; the tracker issues
    /// separate hotlist calls from [`LabelStore::added`]/[`LabelStore::removed`].
    pub(crate) fn update_body(&self, new_comment: Option<&str>, notify: bool) -> (Value, bool) {
        let mut add = Map::new();
        let mut remove = Map::new();
        let mut added = Vec::new();
        let mut removed = Vec::new();

        self.add_update_single(&mut add, &mut added, &mut removed, "status");
        self.add_update_single(&mut add, &mut added, &mut removed, "assignee");
        self.add_update_single(&mut add, &mut added, &mut removed, "reporter");
        self.add_update_single(&mut add, &mut added, &mut removed, "title");

        if !self.ccs.added().is_empty() {
            added.push("ccs");
            add.insert(
                "ccs".to_string(),
                make_users(self.ccs.added().iter().map(String::as_str)),
            );
        }
        if !self.ccs.removed().is_empty() {
            removed.push("ccs");
            remove.insert(
                "ccs".to_string(),
                make_users(self.ccs.removed().iter().map(String::as_str)),
            );
        }

        let has_changes = !added.is_empty() || !removed.is_empty() || new_comment.is_some();

        let mut body = json!({
            "add": add,
            "addMask": added.join(","),
            "remove": remove,
            "removeMask": removed.join(","),
            "significanceOverride": if notify { "MAJOR" } else { "SILENT" },
        });
        if let Some(comment) = new_comment {
            body["issueComment"] = json!({"comment": comment});
        }
        (body, has_changes)
    }

    fn add_update_single(
        &self,
        add: &mut Map<String, Value>,
        added: &mut Vec<&'static str>,
        removed: &mut Vec<&'static str>,
        field: &'static str,
    ) {
        if !self.changed.contains(field) {
            return;
        }
        match self.data.pointer(&format!("/issueState/{}", field)) {
            Some(value) if !value.is_null() => {
                added.push(field);
                add.insert(field.to_string(), value.clone());
            }
            _ => removed.push(field),
        }
    }

    /// Adopts the service's post-save state and resets change tracking.
    pub(crate) fn apply_saved(&mut self, result: Value) {
        if !result.is_null() {
            self.data = result;
        }
        self.is_new = false;
        self.changed.clear();
        self.ccs.reset_tracking();
        self.labels.reset_tracking();
    }
}

/// A modify body carrying only a comment, with empty masks.
pub(crate) fn comment_update(comment: &str) -> Value {
    json!({
        "add": {},
        "addMask": "",
        "remove": {},
        "removeMask": "",
        "issueComment": {"comment": comment},
    })
}

pub(crate) fn make_user(email: &str) -> Value {
    json!({"emailAddress": email})
}

pub(crate) fn make_users<'a>(emails: impl Iterator<Item = &'a str>) -> Value {
    Value::Array(emails.map(make_user).collect())
}

fn hotlist_id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
