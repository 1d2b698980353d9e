//! Share activity notifications for circle members.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use circles_common::models::{circle::Circle, frame::SharingFrame, member::MemberLevel};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Shared,
    Unshared,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Unshared => "unshared",
        }
    }
}

/// What was shared, as far as a notification needs to say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadDescriptor {
    pub id: String,
    pub name: String,
    pub kind: String,
}

impl PayloadDescriptor {
    /// Take `id` and `name` from the payload when present; fall back to the
    /// frame id and type.
    pub fn from_frame(frame: &SharingFrame) -> Self {
        let field = |key: &str| match frame.payload.get(key) {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Self {
            id: field("id").or_else(|| frame.unique_id.clone()).unwrap_or_default(),
            name: field("name").unwrap_or_else(|| frame.frame_type.clone()),
            kind: frame.frame_type.clone(),
        }
    }
}

/// One share or unshare event in a circle.
#[derive(Debug, Clone, Serialize)]
pub struct ShareActivity {
    pub kind: ActivityKind,
    pub author_id: String,
    pub author_name: String,
    pub circle_id: String,
    pub circle_name: String,
    pub payload: PayloadDescriptor,
    /// Path of the shared item relative to the node's web root.
    pub link: String,
    pub timestamp: DateTime<Utc>,
}

impl ShareActivity {
    pub fn for_frame(kind: ActivityKind, circle: &Circle, frame: &SharingFrame) -> Self {
        let author_id = frame.author.clone().unwrap_or_default();
        let frame_id = frame.unique_id.as_deref().unwrap_or_default();
        Self {
            kind,
            author_name: circle.display_name_of(&author_id).to_owned(),
            circle_id: circle.unique_id.clone(),
            circle_name: circle.name.clone(),
            payload: PayloadDescriptor::from_frame(frame),
            link: format!("/circles/{}/frames/{frame_id}", circle.unique_id),
            timestamp: Utc::now(),
            author_id,
        }
    }

    /// Human-readable one-liner, e.g. `Carol shared notes.txt with the circle Friends`.
    pub fn summary(&self) -> String {
        let (verb, preposition) = match self.kind {
            ActivityKind::Shared => ("shared", "with"),
            ActivityKind::Unshared => ("unshared", "from"),
        };
        format!(
            "{} {verb} {} {preposition} the circle {}",
            self.author_name, self.payload.name, self.circle_name
        )
    }
}

/// Everyone to notify about activity in `circle`: its members, its owner, and
/// the configured admin recipient. Each appears once.
pub fn affected_users(circle: &Circle, admin_recipient: &str) -> BTreeSet<String> {
    let mut users: BTreeSet<String> = circle
        .members
        .iter()
        .filter(|m| m.has_level(MemberLevel::Member))
        .map(|m| m.user_id.clone())
        .collect();
    users.insert(circle.owner_id.clone());
    if !admin_recipient.is_empty() {
        users.insert(admin_recipient.to_owned());
    }
    users
}

/// Receives one call per recipient of an activity.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, activity: &ShareActivity, recipient: &str);
}

/// Sink that writes activities to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn publish(&self, activity: &ShareActivity, recipient: &str) {
        info!(
            recipient,
            kind = activity.kind.as_str(),
            circle_id = %activity.circle_id,
            link = %activity.link,
            "{}",
            activity.summary()
        );
    }
}

/// Publish `activity` once to every affected user of `circle`.
pub fn dispatch(sink: &dyn NotificationSink, circle: &Circle, activity: &ShareActivity, admin_recipient: &str) {
    for user in affected_users(circle, admin_recipient) {
        sink.publish(activity, &user);
    }
}
