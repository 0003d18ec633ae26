//! Tracking-service detail lookup.
//!
//! Project-board webhooks only reference the task by node id, so the
//! classifier asks the tracking service for the title, URL and assignees
//! before it can build an intent. [`GithubTracker`] does this with a single
//! GraphQL `node(id:)` query.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use taskpulse_core::TaskState;
use tracing::{debug, instrument, warn};

use crate::error::{truncate_body, TrackerError};

/// Default GitHub GraphQL endpoint.
pub const DEFAULT_GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Number of assignees requested per task.
const ASSIGNEE_PAGE_SIZE: u32 = 50;

const TASK_DETAIL_QUERY: &str = r"
query TaskDetail($id: ID!, $first: Int!) {
  node(id: $id) {
    ... on Issue {
      title
      url
      updatedAt
      state
      assignees(first: $first) { nodes { login } }
    }
    ... on PullRequest {
      title
      url
      updatedAt
      state
      assignees(first: $first) { nodes { login } }
    }
  }
}
";

/// Task details returned by the tracking service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDetail {
    /// Task title.
    pub title: String,
    /// Browser URL.
    pub url: String,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Open/closed state.
    pub state: TaskState,
    /// Assignee logins.
    pub assignees: Vec<String>,
}

/// Read access to task details on the tracking service.
#[async_trait]
pub trait TaskTracker: Send + Sync {
    /// Fetches the details of a task by its node id.
    ///
    /// `credential` authorizes the request on behalf of the caller.
    async fn task_detail(
        &self,
        credential: &str,
        task_id: &str,
    ) -> Result<TaskDetail, TrackerError>;
}

/// GitHub GraphQL implementation of [`TaskTracker`].
#[derive(Debug, Clone)]
pub struct GithubTracker {
    client: reqwest::Client,
    endpoint: String,
}

impl GithubTracker {
    /// Creates a tracker for the given GraphQL endpoint.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("taskpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrackerError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, endpoint: endpoint.into() })
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    node: Option<NodeFields>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeFields {
    title: Option<String>,
    url: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    state: Option<String>,
    assignees: Option<AssigneeConnection>,
}

#[derive(Debug, Deserialize)]
struct AssigneeConnection {
    #[serde(default)]
    nodes: Vec<Option<LoginNode>>,
}

#[derive(Debug, Deserialize)]
struct LoginNode {
    login: String,
}

#[async_trait]
impl TaskTracker for GithubTracker {
    #[instrument(name = "task_detail", skip(self, credential), fields(task_id = %task_id))]
    async fn task_detail(
        &self,
        credential: &str,
        task_id: &str,
    ) -> Result<TaskDetail, TrackerError> {
        let body = json!({
            "query": TASK_DETAIL_QUERY,
            "variables": { "id": task_id, "first": ASSIGNEE_PAGE_SIZE },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "task detail request failed");
                TrackerError::network(e.to_string())
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| TrackerError::network(e.to_string()))?;

        if !status.is_success() {
            return Err(TrackerError::http(status.as_u16(), truncate_body(&text)));
        }

        let parsed: GraphqlResponse = serde_json::from_str(&text)
            .map_err(|e| TrackerError::invalid_response(e.to_string()))?;

        if let Some(first) = parsed.errors.into_iter().next() {
            return Err(TrackerError::Query { message: first.message });
        }

        // Nodes of other types match neither fragment and come back as `{}`.
        let node = parsed
            .data
            .and_then(|data| data.node)
            .filter(|node| node.title.is_some())
            .ok_or_else(|| TrackerError::not_found(task_id))?;

        debug!("fetched task detail");

        Ok(TaskDetail {
            title: node.title.unwrap_or_default(),
            url: node.url.unwrap_or_default(),
            updated_at: node.updated_at,
            state: node.state.as_deref().map_or(TaskState::Open, TaskState::parse),
            assignees: node
                .assignees
                .map(|connection| {
                    connection.nodes.into_iter().flatten().map(|node| node.login).collect()
                })
                .unwrap_or_default(),
        })
    }
}
