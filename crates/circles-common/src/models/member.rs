//! Member model: a user's membership in a specific circle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Effective role of a user within a circle, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberLevel {
    /// Not a member (invited, requesting, or unrelated).
    #[default]
    None,
    Member,
    Moderator,
    Admin,
    Owner,
}

impl MemberLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Member => "member",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "member" => Some(Self::Member),
            "moderator" => Some(Self::Moderator),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }
}

/// Represents a user's membership in a circle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub circle_id: String,
    pub user_id: String,
    pub display_name: String,
    pub level: MemberLevel,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    /// Whether this member holds at least `level` in the circle.
    pub fn has_level(&self, level: MemberLevel) -> bool {
        self.level >= level
    }
}
