//! Circle model: a named group of members, the unit of sharing scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::member::{Member, MemberLevel};

/// A circle as seen by one viewer.
///
/// `viewer` is the acting user's membership (the "higher viewer"); it is `None`
/// when the circle was loaded without a viewer, e.g. while handling a federated
/// request that has no local session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub unique_id: String,
    pub name: String,
    pub owner_id: String,
    pub members: Vec<Member>,
    pub viewer: Option<Member>,
    pub created_at: DateTime<Utc>,
}

impl Circle {
    /// Effective level of the viewer, `None` when there is no viewer or they are not a member.
    pub fn viewer_level(&self) -> MemberLevel {
        self.viewer.as_ref().map(|m| m.level).unwrap_or_default()
    }

    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    /// Display name for a user, falling back to the raw id for non-members.
    pub fn display_name_of<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.member(user_id).map(|m| m.display_name.as_str()).unwrap_or(user_id)
    }
}
