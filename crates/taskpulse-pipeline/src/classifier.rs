//! Event classification.
//!
//! Maps a webhook's event type and action onto a closed [`EventKind`] and
//! builds the matching [`NotificationIntent`]. Only project-board status
//! changes need a round trip to the tracking service; every other kind is
//! built from the payload alone.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use taskpulse_core::{
    AssignmentNotice, CommentNotice, NotificationIntent, RawEvent, StatusOption,
    StatusTransition, TaskSnapshot, TaskState, TaskpulseError,
};
use tracing::{debug, instrument};

use crate::tracker::TaskTracker;

/// Name of the project field whose changes are reported.
pub const STATUS_FIELD: &str = "Status";

/// Every event type and action pair the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `issues` / `opened`
    IssueOpened,
    /// `issues` / `closed`
    IssueClosed,
    /// `issues` / `reopened`
    IssueReopened,
    /// `issues` / `assigned`
    IssueAssigned,
    /// `issues` / `unassigned`
    IssueUnassigned,
    /// `issue_comment` / `created`
    CommentCreated,
    /// `projects_v2_item` / `edited`
    ProjectItemEdited,
    /// Anything else.
    Unrecognized,
}

impl EventKind {
    /// Resolves the kind of an event type and action pair.
    pub fn parse(source_event_type: &str, action: &str) -> Self {
        match (source_event_type, action) {
            ("issues", "opened") => Self::IssueOpened,
            ("issues", "closed") => Self::IssueClosed,
            ("issues", "reopened") => Self::IssueReopened,
            ("issues", "assigned") => Self::IssueAssigned,
            ("issues", "unassigned") => Self::IssueUnassigned,
            ("issue_comment", "created") => Self::CommentCreated,
            ("projects_v2_item", "edited") => Self::ProjectItemEdited,
            _ => Self::Unrecognized,
        }
    }

    /// Returns the kind of a raw event.
    pub fn of(event: &RawEvent) -> Self {
        Self::parse(&event.source_event_type, &event.action)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IssueOpened => "issue_opened",
            Self::IssueClosed => "issue_closed",
            Self::IssueReopened => "issue_reopened",
            Self::IssueAssigned => "issue_assigned",
            Self::IssueUnassigned => "issue_unassigned",
            Self::CommentCreated => "comment_created",
            Self::ProjectItemEdited => "project_item_edited",
            Self::Unrecognized => "unrecognized",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireUser {
    login: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireLabel {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireIssue {
    title: String,
    html_url: String,
    state: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    labels: Vec<WireLabel>,
    assignees: Vec<WireUser>,
}

impl WireIssue {
    fn into_snapshot(self) -> TaskSnapshot {
        TaskSnapshot {
            title: self.title,
            url: self.html_url,
            state: TaskState::parse(&self.state),
            created_at: self.created_at,
            updated_at: self.updated_at,
            labels: self.labels.into_iter().map(|label| label.name).collect(),
            assignees: logins(self.assignees),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssuesPayload {
    issue: WireIssue,
    assignee: Option<WireUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireComment {
    user: WireUser,
    body: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CommentPayload {
    issue: WireIssue,
    comment: WireComment,
}

#[derive(Debug, Deserialize)]
struct ProjectItemPayload {
    projects_v2_item: WireProjectItem,
    changes: Option<WireChanges>,
}

#[derive(Debug, Deserialize)]
struct WireProjectItem {
    content_node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChanges {
    field_value: Option<WireFieldValue>,
}

#[derive(Debug, Deserialize)]
struct WireFieldValue {
    field_name: Option<String>,
    // Shape depends on the field type; only single-select options are objects.
    from: Option<Value>,
    to: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireStatusOption {
    name: String,
    color: Option<String>,
}

fn logins(users: Vec<WireUser>) -> Vec<String> {
    users.into_iter().map(|user| user.login).filter(|login| !login.is_empty()).collect()
}

fn status_option(value: Option<Value>) -> Option<StatusOption> {
    let option: WireStatusOption = serde_json::from_value(value?).ok()?;
    Some(StatusOption { name: option.name, color: option.color })
}

/// Builds notification intents from raw events.
pub struct Classifier {
    tracker: Arc<dyn TaskTracker>,
    credential: String,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier").field("credential", &"[REDACTED]").finish_non_exhaustive()
    }
}

impl Classifier {
    /// Creates a classifier that fetches task details with `credential`.
    pub fn new(tracker: Arc<dyn TaskTracker>, credential: impl Into<String>) -> Self {
        Self { tracker, credential: credential.into() }
    }

    /// Classifies an event.
    ///
    /// # Errors
    ///
    /// - `UnclassifiableEvent` when the event has no notification mapping or
    ///   its payload lacks the objects the mapping needs
    /// - `DetailFetchFailure` when a status change's task could not be
    ///   fetched
    #[instrument(
        name = "classify",
        skip(self, event),
        fields(event_type = %event.source_event_type, action = %event.action)
    )]
    pub async fn classify(&self, event: &RawEvent) -> Result<NotificationIntent, TaskpulseError> {
        let kind = EventKind::of(event);

        if let Some(intent) = classify_payload(kind, &event.payload) {
            debug!(%kind, intent = %intent.kind(), "classified from payload");
            return Ok(intent);
        }

        if kind == EventKind::ProjectItemEdited {
            if let Some(pending) = pending_status_change(&event.payload) {
                return self.resolve_status_change(pending).await;
            }
        }

        Err(unclassifiable(event))
    }

    async fn resolve_status_change(
        &self,
        pending: PendingStatusChange,
    ) -> Result<NotificationIntent, TaskpulseError> {
        let Some(task_id) = pending.task_id else {
            return Err(TaskpulseError::DetailFetchFailure {
                reason: "project item has no content node".to_string(),
            });
        };
        let detail = self.tracker.task_detail(&self.credential, &task_id).await?;

        debug!(
            task_id = %task_id,
            assignees = detail.assignees.len(),
            "fetched status change detail"
        );

        Ok(NotificationIntent::StatusChanged(StatusTransition {
            title: detail.title,
            url: detail.url,
            updated_at: detail.updated_at,
            from: pending.from,
            to: pending.to,
            assignees: detail.assignees,
        }))
    }
}

fn unclassifiable(event: &RawEvent) -> TaskpulseError {
    TaskpulseError::UnclassifiableEvent {
        source_event_type: event.source_event_type.clone(),
        action: event.action.clone(),
    }
}

/// Builds the intent for kinds that need nothing beyond the payload.
///
/// Returns `None` for unrecognized kinds, for payloads missing the objects
/// the kind requires, and for project item edits (which need a detail
/// fetch).
pub fn classify_payload(kind: EventKind, payload: &Value) -> Option<NotificationIntent> {
    match kind {
        EventKind::IssueOpened => {
            Some(NotificationIntent::TaskCreated(issues_payload(payload)?.issue.into_snapshot()))
        },
        EventKind::IssueClosed => {
            Some(NotificationIntent::TaskClosed(issues_payload(payload)?.issue.into_snapshot()))
        },
        EventKind::IssueReopened => {
            Some(NotificationIntent::TaskReopened(issues_payload(payload)?.issue.into_snapshot()))
        },
        EventKind::IssueAssigned => assignment(payload).map(NotificationIntent::AssigneeAdded),
        EventKind::IssueUnassigned => assignment(payload).map(NotificationIntent::AssigneeRemoved),
        EventKind::CommentCreated => {
            let parsed = CommentPayload::deserialize(payload).ok()?;
            Some(NotificationIntent::CommentAdded(CommentNotice {
                task: parsed.issue.into_snapshot(),
                author: parsed.comment.user.login,
                body: parsed.comment.body.unwrap_or_default(),
                created_at: parsed.comment.created_at,
            }))
        },
        EventKind::ProjectItemEdited | EventKind::Unrecognized => None,
    }
}

fn issues_payload(payload: &Value) -> Option<IssuesPayload> {
    IssuesPayload::deserialize(payload).ok()
}

fn assignment(payload: &Value) -> Option<AssignmentNotice> {
    let parsed = issues_payload(payload)?;
    let assignee = parsed.assignee.map(|user| user.login).filter(|login| !login.is_empty())?;
    Some(AssignmentNotice { task: parsed.issue.into_snapshot(), assignee })
}

/// A status field change waiting for its task detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStatusChange {
    /// Node id of the task the project item points at; `None` for drafts.
    pub task_id: Option<String>,
    /// Status before the change.
    pub from: Option<StatusOption>,
    /// Status after the change.
    pub to: Option<StatusOption>,
}

/// Extracts a status change from a `projects_v2_item` / `edited` payload.
///
/// Returns `None` when a different field changed.
pub fn pending_status_change(payload: &Value) -> Option<PendingStatusChange> {
    let parsed = ProjectItemPayload::deserialize(payload).ok()?;
    let field_value = parsed.changes?.field_value?;

    if field_value.field_name.as_deref() != Some(STATUS_FIELD) {
        return None;
    }

    let task_id = parsed.projects_v2_item.content_node_id.filter(|id| !id.is_empty());

    Some(PendingStatusChange {
        task_id,
        from: status_option(field_value.from),
        to: status_option(field_value.to),
    })
}
