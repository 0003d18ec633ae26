//! Notification rendering.
//!
//! Turns a [`NotificationIntent`] into Telegram MarkdownV2 text plus an
//! ordered list of image URLs. Rendering is pure: the same intent and
//! settings always produce byte-identical output, and missing optional
//! fields are replaced by fixed defaults instead of failing.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use regex::Regex;
use taskpulse_core::{
    AssignmentNotice, CommentNotice, NotificationIntent, RenderedNotification, StatusOption,
    StatusTransition, TaskSnapshot, TaskState,
};

/// Shown when a task has no labels.
pub const NO_LABELS: &str = "no labels";
/// Shown when a task has no assignees.
pub const NOT_SPECIFIED: &str = "not specified";
/// Shown in assignment notices when nobody is left assigned.
pub const NOBODY_ASSIGNED: &str = "nobody assigned";
/// Shown when a comment has no text besides images.
pub const NO_TEXT: &str = "no text";
/// Shown when a timestamp is missing.
pub const UNKNOWN_TIME: &str = "unknown";

const TIMESTAMP_FORMAT: &str = "%d.%m.%Y, %H:%M:%S";
const OPEN_TASK: &str = "Open task";

/// Characters that must be backslash-escaped in MarkdownV2 text.
const RESERVED: &[char] = &[
    '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
    '!', '$', '&',
];

/// Escapes text for use anywhere in a MarkdownV2 message outside link targets.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        if RESERVED.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escapes a URL for use inside the `(...)` part of a MarkdownV2 link.
///
/// Only `)` and `\` are special there.
pub fn escape_link_url(url: &str) -> String {
    let mut escaped = String::with_capacity(url.len());
    for ch in url.chars() {
        if ch == ')' || ch == '\\' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"!\[.*?\]\((.*?)\)").expect("image pattern is valid"))
}

/// Splits markdown image references out of a comment body.
///
/// Returns the body with every `![alt](url)` removed and trimmed, and the
/// image URLs in the order they appeared.
pub fn extract_images(body: &str) -> (String, Vec<String>) {
    let pattern = image_pattern();

    let images = pattern
        .captures_iter(body)
        .filter_map(|captures| captures.get(1))
        .map(|url| url.as_str().to_string())
        .filter(|url| !url.is_empty())
        .collect();

    let stripped = pattern.replace_all(body, "").trim().to_string();

    (stripped, images)
}

/// Maps a board color name to its status symbol.
pub fn color_symbol(color: Option<&str>) -> &'static str {
    match color.map(str::to_ascii_lowercase).as_deref() {
        Some("red") => "🔴",
        Some("green") => "🟢",
        Some("yellow") => "🟡",
        Some("blue") => "🔵",
        Some("purple") => "🟣",
        Some("orange") => "🟠",
        Some("gray") => "⚪️",
        _ => "⚫️",
    }
}

/// Renders intents into MarkdownV2 notifications.
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    offset: FixedOffset,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::utc()
    }
}

impl Formatter {
    /// Creates a formatter that displays timestamps in the given offset.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Creates a formatter that displays timestamps in UTC.
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Creates a formatter from an offset in minutes east of UTC.
    ///
    /// Returns `None` when the offset is outside ±24 hours.
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        minutes.checked_mul(60).and_then(FixedOffset::east_opt).map(Self::new)
    }

    /// Renders an intent.
    pub fn render(&self, intent: &NotificationIntent) -> RenderedNotification {
        match intent {
            NotificationIntent::TaskCreated(task) => self.task_created(task),
            NotificationIntent::TaskClosed(task) => {
                self.task_state_changed(task, TaskState::Closed)
            },
            NotificationIntent::TaskReopened(task) => {
                self.task_state_changed(task, TaskState::Open)
            },
            NotificationIntent::CommentAdded(comment) => self.comment_added(comment),
            NotificationIntent::AssigneeAdded(notice) => self.assignee_added(notice),
            NotificationIntent::AssigneeRemoved(notice) => self.assignee_removed(notice),
            NotificationIntent::StatusChanged(transition) => self.status_changed(transition),
        }
    }

    fn task_created(&self, task: &TaskSnapshot) -> RenderedNotification {
        let text = [
            "🆕 *New task created\\!*".to_string(),
            String::new(),
            format!("📌 *Title:* {}", escape_markdown_v2(&task.title)),
            format!("🔗 *Link:* {}", open_task_link(&task.url)),
            format!("📅 *Created:* {}", self.timestamp(task.created_at)),
            format!("📂 *State:* {}", state_label(task.state)),
            format!("🏷️ *Labels:* {}", labels_text(&task.labels)),
            format!("👥 *Assigned to:* {}", assignees_text(&task.assignees, NOT_SPECIFIED)),
        ]
        .join("\n");

        RenderedNotification::text(text)
    }

    fn task_state_changed(
        &self,
        task: &TaskSnapshot,
        direction: TaskState,
    ) -> RenderedNotification {
        let headline = match direction {
            TaskState::Closed => "🔴 *Task closed\\!*",
            TaskState::Open => "🟢 *Task reopened\\!*",
        };

        let text = [
            headline.to_string(),
            String::new(),
            format!("*Title:* {}", escape_markdown_v2(&task.title)),
            format!("*Link:* {}", open_task_link(&task.url)),
            format!("*Updated:* {}", self.timestamp(task.updated_at)),
            format!("*Assigned to:* {}", assignees_text(&task.assignees, NOT_SPECIFIED)),
        ]
        .join("\n");

        RenderedNotification::text(text)
    }

    fn assignee_added(&self, notice: &AssignmentNotice) -> RenderedNotification {
        let task = &notice.task;
        let text = [
            "🔔 *New task assignment\\!*".to_string(),
            String::new(),
            format!("📌 *Title:* {}", escape_markdown_v2(&task.title)),
            format!("🔗 *Link:* {}", open_task_link(&task.url)),
            format!("🙋 *Assigned user:* {}", escape_markdown_v2(&notice.assignee)),
            format!("📅 *Created:* {}", self.timestamp(task.created_at)),
            format!("📂 *Current state:* {}", state_label(task.state)),
            format!("🏷 *Labels:* {}", labels_text(&task.labels)),
            format!("👥 *Assigned to:* {}", assignees_text(&task.assignees, NOBODY_ASSIGNED)),
        ]
        .join("\n");

        RenderedNotification::text(text)
    }

    fn assignee_removed(&self, notice: &AssignmentNotice) -> RenderedNotification {
        let task = &notice.task;
        let text = [
            "🚫 *Removed from task\\!*".to_string(),
            String::new(),
            format!("📌 *Title:* {}", escape_markdown_v2(&task.title)),
            format!("🔗 *Link:* {}", open_task_link(&task.url)),
            format!("🙅 *Removed user:* {}", escape_markdown_v2(&notice.assignee)),
            format!("📅 *Created:* {}", self.timestamp(task.created_at)),
            format!("📂 *Current state:* {}", state_label(task.state)),
            format!("🏷 *Labels:* {}", labels_text(&task.labels)),
            format!(
                "👥 *Current assignees:* {}",
                assignees_text(&task.assignees, NOBODY_ASSIGNED)
            ),
        ]
        .join("\n");

        RenderedNotification::text(text)
    }

    fn status_changed(&self, transition: &StatusTransition) -> RenderedNotification {
        let text = [
            "🔄 *Task status changed\\!*".to_string(),
            String::new(),
            format!("📌 *Task:* {}", titled_link(&transition.title, &transition.url)),
            format!("❌ *Old status:* {}", status_text(transition.from.as_ref())),
            format!("✅ *New status:* {}", status_text(transition.to.as_ref())),
            format!("📅 *Updated:* {}", self.timestamp(transition.updated_at)),
        ]
        .join("\n");

        RenderedNotification::text(text)
    }

    fn comment_added(&self, comment: &CommentNotice) -> RenderedNotification {
        let (body, media) = extract_images(&comment.body);
        let body = if body.is_empty() { NO_TEXT.to_string() } else { body };

        let text = [
            "💬 *New comment on a task\\!*".to_string(),
            String::new(),
            format!("*Task:* {}", titled_link(&comment.task.title, &comment.task.url)),
            format!("*Author:* {}", escape_markdown_v2(&comment.author)),
            format!("*Comment:* {}", escape_markdown_v2(&body)),
            format!("*Commented:* {}", self.timestamp(comment.created_at)),
        ]
        .join("\n");

        RenderedNotification { text, media }
    }

    fn timestamp(&self, value: Option<DateTime<Utc>>) -> String {
        let rendered = value.map_or_else(
            || UNKNOWN_TIME.to_string(),
            |time| time.with_timezone(&self.offset).format(TIMESTAMP_FORMAT).to_string(),
        );
        escape_markdown_v2(&rendered)
    }
}

fn open_task_link(url: &str) -> String {
    if url.trim().is_empty() {
        return NOT_SPECIFIED.to_string();
    }
    format!("[{OPEN_TASK}]({})", escape_link_url(url))
}

/// Links the title to the task, falling back to plain text or the generic
/// link when either part is missing.
fn titled_link(title: &str, url: &str) -> String {
    match (title.trim().is_empty(), url.trim().is_empty()) {
        (false, false) => format!("[{}]({})", escape_markdown_v2(title), escape_link_url(url)),
        (false, true) => escape_markdown_v2(title),
        (true, _) => open_task_link(url),
    }
}

fn state_label(state: TaskState) -> &'static str {
    match state {
        TaskState::Open => "🟢 Open",
        TaskState::Closed => "🔴 Closed",
    }
}

fn labels_text(labels: &[String]) -> String {
    if labels.is_empty() {
        return NO_LABELS.to_string();
    }
    let joined = labels.iter().map(|label| format!("#{label}")).collect::<Vec<_>>().join(", ");
    escape_markdown_v2(&joined)
}

fn assignees_text(assignees: &[String], default: &str) -> String {
    if assignees.is_empty() {
        return default.to_string();
    }
    escape_markdown_v2(&assignees.join(", "))
}

fn status_text(status: Option<&StatusOption>) -> String {
    match status {
        Some(status) => format!(
            "{} {}",
            color_symbol(status.color.as_deref()),
            escape_markdown_v2(&status.name)
        ),
        None => format!("{} {}", color_symbol(None), NOT_SPECIFIED),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn snapshot() -> TaskSnapshot {
        TaskSnapshot {
            title: "Fix bug".into(),
            url: "https://github.com/acme/app/issues/1".into(),
            state: TaskState::Open,
            created_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap()),
            updated_at: Some(Utc.with_ymd_and_hms(2024, 3, 2, 23, 30, 0).unwrap()),
            labels: vec!["bug".into(), "ui-kit".into()],
            assignees: vec!["alice".into()],
        }
    }

    #[test]
    fn escapes_every_reserved_character() {
        assert_eq!(escape_markdown_v2("a_b*c"), "a\\_b\\*c");
        assert_eq!(escape_markdown_v2("v1.2 (beta)!"), "v1\\.2 \\(beta\\)\\!");
        assert_eq!(escape_markdown_v2("$5 & #tag"), "\\$5 \\& \\#tag");
        assert_eq!(escape_markdown_v2("a\\b"), "a\\\\b");
        assert_eq!(escape_markdown_v2("`code` ~x~"), "\\`code\\` \\~x\\~");
        assert_eq!(escape_markdown_v2("plain text"), "plain text");
    }

    #[test]
    fn link_urls_escape_only_paren_and_backslash() {
        assert_eq!(
            escape_link_url("https://x.dev/a_b(1)?q=1"),
            "https://x.dev/a_b(1\\)?q=1"
        );
        assert_eq!(escape_link_url("https://x/a\\b"), "https://x/a\\\\b");
    }

    #[test]
    fn extracts_images_in_order() {
        let (text, images) =
            extract_images("see ![Image](https://x/y.png) and ![](https://x/z.jpg) done");

        assert_eq!(text, "see  and  done");
        assert_eq!(images, vec!["https://x/y.png".to_string(), "https://x/z.jpg".to_string()]);
    }

    #[test]
    fn task_created_renders_all_fields() {
        let rendered = Formatter::utc().render(&NotificationIntent::TaskCreated(snapshot()));

        assert_eq!(
            rendered.text,
            "🆕 *New task created\\!*\n\n\
             📌 *Title:* Fix bug\n\
             🔗 *Link:* [Open task](https://github.com/acme/app/issues/1)\n\
             📅 *Created:* 01\\.03\\.2024, 09:05:07\n\
             📂 *State:* 🟢 Open\n\
             🏷️ *Labels:* \\#bug, \\#ui\\-kit\n\
             👥 *Assigned to:* alice"
        );
        assert!(rendered.media.is_empty());
    }

    #[test]
    fn task_created_uses_defaults_for_missing_fields() {
        let mut task = snapshot();
        task.labels.clear();
        task.assignees.clear();
        task.created_at = None;

        let text = Formatter::utc().render(&NotificationIntent::TaskCreated(task)).text;

        assert!(text.contains("*Labels:* no labels"));
        assert!(text.contains("*Assigned to:* not specified"));
        assert!(text.contains("*Created:* unknown"));
    }

    #[test]
    fn timestamps_use_configured_offset() {
        let formatter = Formatter::with_offset_minutes(180).unwrap();
        let text = formatter.render(&NotificationIntent::TaskClosed(snapshot())).text;

        assert!(text.starts_with("🔴 *Task closed\\!*"));
        assert!(text.contains("*Updated:* 03\\.03\\.2024, 02:30:00"));
    }

    #[test]
    fn offsets_beyond_a_day_are_rejected() {
        assert!(Formatter::with_offset_minutes(24 * 60).is_none());
        assert!(Formatter::with_offset_minutes(i32::MAX).is_none());
        assert!(Formatter::with_offset_minutes(-300).is_some());
    }

    #[test]
    fn reopened_headline() {
        let text = Formatter::utc().render(&NotificationIntent::TaskReopened(snapshot())).text;
        assert!(text.starts_with("🟢 *Task reopened\\!*"));
    }

    #[test]
    fn assignee_removed_lists_remaining_assignees() {
        let mut task = snapshot();
        task.assignees.clear();
        let intent = NotificationIntent::AssigneeRemoved(AssignmentNotice {
            task,
            assignee: "bob_smith".into(),
        });

        let text = Formatter::utc().render(&intent).text;

        assert!(text.contains("*Removed user:* bob\\_smith"));
        assert!(text.contains("*Current assignees:* nobody assigned"));
    }

    #[test]
    fn assignee_added_names_the_user() {
        let intent = NotificationIntent::AssigneeAdded(AssignmentNotice {
            task: snapshot(),
            assignee: "alice".into(),
        });

        let text = Formatter::utc().render(&intent).text;

        assert!(text.starts_with("🔔 *New task assignment\\!*"));
        assert!(text.contains("*Assigned user:* alice"));
        assert!(text.contains("*Current state:* 🟢 Open"));
    }

    #[test]
    fn status_change_maps_colors_case_insensitively() {
        let intent = NotificationIntent::StatusChanged(StatusTransition {
            title: "Ship it".into(),
            url: "https://github.com/acme/app/issues/2".into(),
            updated_at: None,
            from: Some(StatusOption { name: "In Progress".into(), color: Some("YELLOW".into()) }),
            to: Some(StatusOption { name: "Done".into(), color: Some("Pink".into()) }),
            assignees: vec![],
        });

        let text = Formatter::utc().render(&intent).text;

        assert!(text.contains("*Task:* [Ship it](https://github.com/acme/app/issues/2)"));
        assert!(text.contains("*Old status:* 🟡 In Progress"));
        assert!(text.contains("*New status:* ⚫️ Done"));
    }

    #[test]
    fn missing_links_are_never_rendered_empty() {
        let mut task = snapshot();
        task.url.clear();
        let created = Formatter::utc().render(&NotificationIntent::TaskCreated(task)).text;
        assert!(created.contains("*Link:* not specified"));
        assert!(!created.contains("]()"));

        let comment = |title: &str, url: &str| {
            let task = TaskSnapshot { title: title.into(), url: url.into(), ..snapshot() };
            let intent = NotificationIntent::CommentAdded(CommentNotice {
                task,
                author: "carol".into(),
                body: "ok".into(),
                created_at: None,
            });
            Formatter::utc().render(&intent).text
        };

        assert!(comment("Fix bug", "").contains("*Task:* Fix bug\n"));
        assert!(comment("", "https://x/1").contains("*Task:* [Open task](https://x/1)"));
        assert!(comment("", "").contains("*Task:* not specified"));
        assert!(!comment("", "https://x/1").contains("[]("));
    }

    #[test]
    fn color_symbols() {
        assert_eq!(color_symbol(Some("GREEN")), "🟢");
        assert_eq!(color_symbol(Some("gray")), "⚪️");
        assert_eq!(color_symbol(None), "⚫️");
    }

    #[test]
    fn comment_strips_images_into_media() {
        let intent = NotificationIntent::CommentAdded(CommentNotice {
            task: TaskSnapshot { title: "T".into(), ..snapshot() },
            author: "carol".into(),
            body: "see ![Image](https://x/y.png)".into(),
            created_at: None,
        });

        let rendered = Formatter::utc().render(&intent);

        assert_eq!(rendered.media, vec!["https://x/y.png".to_string()]);
        assert!(rendered.text.contains("*Comment:* see\n"));
        assert!(!rendered.text.contains("!["));
        assert!(!rendered.text.contains("y.png"));
    }

    #[test]
    fn image_only_comment_has_placeholder_text() {
        let intent = NotificationIntent::CommentAdded(CommentNotice {
            task: snapshot(),
            author: "carol".into(),
            body: "![](https://x/a.png)".into(),
            created_at: None,
        });

        let rendered = Formatter::utc().render(&intent);

        assert!(rendered.text.contains("*Comment:* no text"));
        assert_eq!(rendered.media.len(), 1);
    }

    #[test]
    fn rendering_is_deterministic() {
        let intent = NotificationIntent::TaskCreated(snapshot());
        let formatter = Formatter::with_offset_minutes(60).unwrap();

        assert_eq!(formatter.render(&intent), formatter.render(&intent));
    }
}
