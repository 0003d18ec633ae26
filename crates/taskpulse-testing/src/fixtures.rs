//! Webhook payload builders.
//!
//! Builders produce payloads shaped like the tracking service's webhook
//! deliveries, with sensible defaults for every field the pipeline reads.

use serde_json::{json, Value};

/// Default task URL used by the builders.
pub const DEFAULT_TASK_URL: &str = "https://github.com/acme/widgets/issues/42";

/// Default task title used by the builders.
pub const DEFAULT_TASK_TITLE: &str = "Fix login";

/// Builder for `issues` event payloads.
#[derive(Debug, Clone)]
pub struct IssueEventBuilder {
    action: String,
    id: i64,
    title: String,
    url: String,
    state: String,
    created_at: String,
    updated_at: String,
    labels: Vec<String>,
    assignees: Vec<String>,
    assignee: Option<String>,
}

impl IssueEventBuilder {
    /// Creates a builder for the given action with default issue fields.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            id: 1001,
            title: DEFAULT_TASK_TITLE.to_string(),
            url: DEFAULT_TASK_URL.to_string(),
            state: "open".to_string(),
            created_at: "2024-03-01T09:30:00Z".to_string(),
            updated_at: "2024-03-01T10:00:00Z".to_string(),
            labels: Vec::new(),
            assignees: Vec::new(),
            assignee: None,
        }
    }

    /// `issues` / `opened`.
    pub fn opened() -> Self {
        Self::new("opened")
    }

    /// `issues` / `closed`, with the issue state set to closed.
    pub fn closed() -> Self {
        Self::new("closed").state("closed")
    }

    /// `issues` / `reopened`.
    pub fn reopened() -> Self {
        Self::new("reopened")
    }

    /// `issues` / `assigned` for the given login.
    pub fn assigned(login: impl Into<String>) -> Self {
        let login = login.into();
        Self::new("assigned").assignees([login.as_str()]).assignee(login)
    }

    /// `issues` / `unassigned` for the given login.
    pub fn unassigned(login: impl Into<String>) -> Self {
        Self::new("unassigned").assignee(login)
    }

    /// Sets the issue id.
    #[must_use]
    pub fn id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Sets the issue title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the issue URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the issue state.
    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Sets the creation timestamp (RFC 3339).
    #[must_use]
    pub fn created_at(mut self, timestamp: impl Into<String>) -> Self {
        self.created_at = timestamp.into();
        self
    }

    /// Sets the update timestamp (RFC 3339).
    #[must_use]
    pub fn updated_at(mut self, timestamp: impl Into<String>) -> Self {
        self.updated_at = timestamp.into();
        self
    }

    /// Sets the label names.
    #[must_use]
    pub fn labels<'a>(mut self, labels: impl IntoIterator<Item = &'a str>) -> Self {
        self.labels = labels.into_iter().map(str::to_string).collect();
        self
    }

    /// Sets the assignee logins.
    #[must_use]
    pub fn assignees<'a>(mut self, logins: impl IntoIterator<Item = &'a str>) -> Self {
        self.assignees = logins.into_iter().map(str::to_string).collect();
        self
    }

    /// Sets the top-level `assignee` of an assignment event.
    #[must_use]
    pub fn assignee(mut self, login: impl Into<String>) -> Self {
        self.assignee = Some(login.into());
        self
    }

    /// Builds the payload.
    pub fn build(self) -> Value {
        let mut payload = json!({
            "action": self.action,
            "issue": issue_json(
                self.id,
                &self.title,
                &self.url,
                &self.state,
                &self.created_at,
                &self.updated_at,
                &self.labels,
                &self.assignees,
            ),
        });

        if let Some(login) = self.assignee {
            payload["assignee"] = json!({ "login": login });
        }

        payload
    }
}

/// Builder for `issue_comment` / `created` payloads.
#[derive(Debug, Clone)]
pub struct CommentEventBuilder {
    comment_id: i64,
    author: String,
    body: Option<String>,
    created_at: String,
    title: String,
    url: String,
    assignees: Vec<String>,
}

impl CommentEventBuilder {
    /// Creates a builder with a short plain comment.
    pub fn new() -> Self {
        Self {
            comment_id: 5001,
            author: "reviewer".to_string(),
            body: Some("Looks good".to_string()),
            created_at: "2024-03-01T11:15:00Z".to_string(),
            title: DEFAULT_TASK_TITLE.to_string(),
            url: DEFAULT_TASK_URL.to_string(),
            assignees: Vec::new(),
        }
    }

    /// Sets the comment id.
    #[must_use]
    pub fn id(mut self, id: i64) -> Self {
        self.comment_id = id;
        self
    }

    /// Sets the comment author's login.
    #[must_use]
    pub fn author(mut self, login: impl Into<String>) -> Self {
        self.author = login.into();
        self
    }

    /// Sets the comment body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sends the comment with a `null` body.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = None;
        self
    }

    /// Sets the commented issue's title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the commented issue's assignees.
    #[must_use]
    pub fn assignees<'a>(mut self, logins: impl IntoIterator<Item = &'a str>) -> Self {
        self.assignees = logins.into_iter().map(str::to_string).collect();
        self
    }

    /// Builds the payload.
    pub fn build(self) -> Value {
        json!({
            "action": "created",
            "issue": issue_json(
                1001,
                &self.title,
                &self.url,
                "open",
                "2024-03-01T09:30:00Z",
                "2024-03-01T10:00:00Z",
                &[],
                &self.assignees,
            ),
            "comment": {
                "id": self.comment_id,
                "user": { "login": self.author },
                "body": self.body,
                "created_at": self.created_at,
            },
        })
    }
}

impl Default for CommentEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `projects_v2_item` / `edited` payloads.
#[derive(Debug, Clone)]
pub struct ProjectItemEventBuilder {
    item_id: i64,
    content_node_id: Option<String>,
    field_name: String,
    from: Value,
    to: Value,
}

impl ProjectItemEventBuilder {
    /// Creates a status change from "Todo" to "In Progress".
    pub fn status_change() -> Self {
        Self {
            item_id: 7001,
            content_node_id: Some("I_kwDOAbc123".to_string()),
            field_name: "Status".to_string(),
            from: status_json("opt-todo", "Todo", "GRAY"),
            to: status_json("opt-progress", "In Progress", "YELLOW"),
        }
    }

    /// Sets the project item id.
    #[must_use]
    pub fn id(mut self, id: i64) -> Self {
        self.item_id = id;
        self
    }

    /// Sets the node id of the underlying task.
    #[must_use]
    pub fn content_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.content_node_id = Some(node_id.into());
        self
    }

    /// Removes the underlying task, as for draft items.
    #[must_use]
    pub fn without_content(mut self) -> Self {
        self.content_node_id = None;
        self
    }

    /// Sets the name of the changed field.
    #[must_use]
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Sets the previous status option.
    #[must_use]
    pub fn from_status(mut self, id: &str, name: &str, color: &str) -> Self {
        self.from = status_json(id, name, color);
        self
    }

    /// Sets the new status option.
    #[must_use]
    pub fn to_status(mut self, id: &str, name: &str, color: &str) -> Self {
        self.to = status_json(id, name, color);
        self
    }

    /// Sets the raw `from` value, for fields that are not single-select.
    #[must_use]
    pub fn from_value(mut self, value: Value) -> Self {
        self.from = value;
        self
    }

    /// Builds the payload.
    pub fn build(self) -> Value {
        json!({
            "action": "edited",
            "projects_v2_item": {
                "id": self.item_id,
                "content_node_id": self.content_node_id,
                "content_type": "Issue",
            },
            "changes": {
                "field_value": {
                    "field_name": self.field_name,
                    "field_type": "single_select",
                    "from": self.from,
                    "to": self.to,
                },
            },
        })
    }
}

/// Builds a status option object as sent in project item changes.
pub fn status_json(id: &str, name: &str, color: &str) -> Value {
    json!({ "id": id, "name": name, "color": color })
}

#[allow(clippy::too_many_arguments)]
fn issue_json(
    id: i64,
    title: &str,
    url: &str,
    state: &str,
    created_at: &str,
    updated_at: &str,
    labels: &[String],
    assignees: &[String],
) -> Value {
    json!({
        "id": id,
        "node_id": format!("I_node{id}"),
        "title": title,
        "html_url": url,
        "state": state,
        "created_at": created_at,
        "updated_at": updated_at,
        "labels": labels.iter().map(|name| json!({ "name": name })).collect::<Vec<_>>(),
        "assignees": assignees.iter().map(|login| json!({ "login": login })).collect::<Vec<_>>(),
    })
}
