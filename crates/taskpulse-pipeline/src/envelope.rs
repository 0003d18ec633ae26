//! Event identity derivation.
//!
//! The identity is the dedup key for a webhook delivery. It is built from the
//! event type, the action and an intrinsic id taken from the payload so that
//! redeliveries of the same change collapse to one key while distinct changes
//! on the same object stay distinct.

use serde_json::Value;
use sha2::{Digest, Sha256};
use taskpulse_core::{EventIdentity, RawEvent};

/// Derives the dedup identity of an event.
///
/// Format is `{type}:{action}:{intrinsic id}`. When the payload carries no
/// recognizable intrinsic id the SHA-256 of the payload's canonical JSON
/// serialization is used instead.
pub fn derive_identity(event: &RawEvent) -> EventIdentity {
    let intrinsic = intrinsic_id(event).unwrap_or_else(|| payload_digest(&event.payload));

    EventIdentity(format!("{}:{}:{}", event.source_event_type, event.action, intrinsic))
}

fn intrinsic_id(event: &RawEvent) -> Option<String> {
    let payload = &event.payload;

    match event.source_event_type.as_str() {
        "issues" => {
            let issue_id = id_string(payload.pointer("/issue/id")?)?;
            match event.action.as_str() {
                "assigned" | "unassigned" => {
                    let login = payload.pointer("/assignee/login").and_then(Value::as_str)?;
                    Some(format!("{issue_id}:{login}"))
                },
                _ => Some(issue_id),
            }
        },
        "issue_comment" => id_string(payload.pointer("/comment/id")?),
        "projects_v2_item" => {
            let item_id = id_string(payload.pointer("/projects_v2_item/id")?)?;
            let target = payload.pointer("/changes/field_value/to").and_then(status_key);
            Some(match target {
                Some(target) => format!("{item_id}:{target}"),
                None => item_id,
            })
        },
        _ => None,
    }
}

/// Identifies a target status by option id, falling back to its name.
fn status_key(to: &Value) -> Option<String> {
    to.get("id").and_then(id_string).or_else(|| to.get("name").and_then(id_string))
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}

/// Hex SHA-256 of the payload's canonical serialization.
fn payload_digest(payload: &Value) -> String {
    let canonical = canonicalize(payload).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Rebuilds a value with object keys in sorted order at every level.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect())
        },
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn event(event_type: &str, payload: Value) -> RawEvent {
        RawEvent::new(event_type, payload, Utc::now())
    }

    #[test]
    fn issue_identity_uses_issue_id() {
        let identity =
            derive_identity(&event("issues", json!({"action": "opened", "issue": {"id": 42}})));
        assert_eq!(identity.0, "issues:opened:42");
    }

    #[test]
    fn assignment_identity_includes_assignee() {
        let alice = event(
            "issues",
            json!({"action": "assigned", "issue": {"id": 42}, "assignee": {"login": "alice"}}),
        );
        let bob = event(
            "issues",
            json!({"action": "assigned", "issue": {"id": 42}, "assignee": {"login": "bob"}}),
        );

        assert_eq!(derive_identity(&alice).0, "issues:assigned:42:alice");
        assert_ne!(derive_identity(&alice), derive_identity(&bob));
    }

    #[test]
    fn comment_identity_uses_comment_id() {
        let identity = derive_identity(&event(
            "issue_comment",
            json!({"action": "created", "issue": {"id": 1}, "comment": {"id": 987}}),
        ));
        assert_eq!(identity.0, "issue_comment:created:987");
    }

    #[test]
    fn project_item_identity_includes_target_status() {
        let payload = |to: &str| {
            json!({
                "action": "edited",
                "projects_v2_item": {"id": 7},
                "changes": {
                    "field_value": {"field_name": "Status", "to": {"id": to, "name": "Done"}}
                }
            })
        };

        let done = derive_identity(&event("projects_v2_item", payload("opt-done")));
        let todo = derive_identity(&event("projects_v2_item", payload("opt-todo")));

        assert_eq!(done.0, "projects_v2_item:edited:7:opt-done");
        assert_ne!(done, todo);
    }

    #[test]
    fn unknown_events_hash_the_payload() {
        let first = derive_identity(&event("push", json!({"ref": "main", "after": "abc"})));
        let reordered = derive_identity(&event("push", json!({"after": "abc", "ref": "main"})));
        let different = derive_identity(&event("push", json!({"ref": "main", "after": "def"})));

        assert_eq!(first, reordered);
        assert_ne!(first, different);
        assert!(first.0.starts_with("push::"));
        assert_eq!(first.0.len(), "push::".len() + 64);
    }

    #[test]
    fn missing_intrinsic_id_falls_back_to_digest() {
        let identity = derive_identity(&event("issues", json!({"action": "opened", "issue": {}})));
        assert!(identity.0.starts_with("issues:opened:"));
        assert_eq!(identity.0.len(), "issues:opened:".len() + 64);
    }
}
