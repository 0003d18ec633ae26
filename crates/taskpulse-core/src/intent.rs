//! Notification intents.
//!
//! An intent is the normalized "what happened" for one webhook event,
//! decoupled from the wire payload. It carries exactly the fields its
//! formatter needs plus the audience: the external identities to notify.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Open/closed state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Task is open.
    Open,
    /// Task is closed.
    Closed,
}

impl TaskState {
    /// Parses the tracking service's state string; anything but `closed` is
    /// treated as open.
    pub fn parse(state: &str) -> Self {
        if state.eq_ignore_ascii_case("closed") {
            Self::Closed
        } else {
            Self::Open
        }
    }
}

/// Snapshot of an issue as carried by an issue or comment payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    /// Task title.
    pub title: String,
    /// Browser URL of the task.
    pub url: String,
    /// Current state.
    pub state: TaskState,
    /// Creation time, when present in the payload.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time, when present in the payload.
    pub updated_at: Option<DateTime<Utc>>,
    /// Label names.
    pub labels: Vec<String>,
    /// Logins of current assignees.
    pub assignees: Vec<String>,
}

/// A comment posted on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentNotice {
    /// Task the comment belongs to.
    pub task: TaskSnapshot,
    /// Login of the comment author.
    pub author: String,
    /// Raw comment body, markdown as written by the author.
    pub body: String,
    /// When the comment was created.
    pub created_at: Option<DateTime<Utc>>,
}

/// A user added to or removed from a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignmentNotice {
    /// Task after the change.
    pub task: TaskSnapshot,
    /// Login of the user that was added or removed.
    pub assignee: String,
}

/// A workflow status option on a project board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusOption {
    /// Status name (e.g. "In Progress").
    pub name: String,
    /// Board color name (e.g. "YELLOW"), when provided.
    pub color: Option<String>,
}

/// A project item moved between workflow statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusTransition {
    /// Task title, from the detail fetch.
    pub title: String,
    /// Task URL, from the detail fetch.
    pub url: String,
    /// Task update time, from the detail fetch.
    pub updated_at: Option<DateTime<Utc>>,
    /// Status before the change.
    pub from: Option<StatusOption>,
    /// Status after the change.
    pub to: Option<StatusOption>,
    /// Logins of the task's assignees, from the detail fetch.
    pub assignees: Vec<String>,
}

/// Kind tag of an intent.
///
/// `Unrecognized` is never carried by a [`NotificationIntent`]; it names the
/// classification result of event/action pairs without a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// New task opened.
    TaskCreated,
    /// Task closed.
    TaskClosed,
    /// Task reopened.
    TaskReopened,
    /// Comment posted on a task.
    CommentAdded,
    /// User assigned to a task.
    AssigneeAdded,
    /// User unassigned from a task.
    AssigneeRemoved,
    /// Project workflow status changed.
    StatusChanged,
    /// No notification for this event.
    Unrecognized,
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TaskCreated => "task_created",
            Self::TaskClosed => "task_closed",
            Self::TaskReopened => "task_reopened",
            Self::CommentAdded => "comment_added",
            Self::AssigneeAdded => "assignee_added",
            Self::AssigneeRemoved => "assignee_removed",
            Self::StatusChanged => "status_changed",
            Self::Unrecognized => "unrecognized",
        };
        f.write_str(name)
    }
}

/// Normalized notification intent built from one webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum NotificationIntent {
    /// `issues` / `opened`.
    TaskCreated(TaskSnapshot),
    /// `issues` / `closed`.
    TaskClosed(TaskSnapshot),
    /// `issues` / `reopened`.
    TaskReopened(TaskSnapshot),
    /// `issue_comment` / `created`.
    CommentAdded(CommentNotice),
    /// `issues` / `assigned`.
    AssigneeAdded(AssignmentNotice),
    /// `issues` / `unassigned`.
    AssigneeRemoved(AssignmentNotice),
    /// `projects_v2_item` / `edited` on the Status field.
    StatusChanged(StatusTransition),
}

impl NotificationIntent {
    /// Returns the kind tag.
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::TaskCreated(_) => IntentKind::TaskCreated,
            Self::TaskClosed(_) => IntentKind::TaskClosed,
            Self::TaskReopened(_) => IntentKind::TaskReopened,
            Self::CommentAdded(_) => IntentKind::CommentAdded,
            Self::AssigneeAdded(_) => IntentKind::AssigneeAdded,
            Self::AssigneeRemoved(_) => IntentKind::AssigneeRemoved,
            Self::StatusChanged(_) => IntentKind::StatusChanged,
        }
    }

    /// Returns the title of the task the intent is about.
    pub fn title(&self) -> &str {
        match self {
            Self::TaskCreated(task) | Self::TaskClosed(task) | Self::TaskReopened(task) => {
                &task.title
            },
            Self::CommentAdded(comment) => &comment.task.title,
            Self::AssigneeAdded(notice) | Self::AssigneeRemoved(notice) => &notice.task.title,
            Self::StatusChanged(transition) => &transition.title,
        }
    }

    /// Returns the external identities that should be notified, in payload
    /// order.
    ///
    /// Assignment changes notify only the user that was added or removed;
    /// every other intent notifies the task's assignees.
    pub fn audience(&self) -> Vec<String> {
        match self {
            Self::TaskCreated(task) | Self::TaskClosed(task) | Self::TaskReopened(task) => {
                task.assignees.clone()
            },
            Self::CommentAdded(comment) => comment.task.assignees.clone(),
            Self::AssigneeAdded(notice) | Self::AssigneeRemoved(notice) => {
                vec![notice.assignee.clone()]
            },
            Self::StatusChanged(transition) => transition.assignees.clone(),
        }
    }
}
