//! Federated link model: a trust relationship between a local and a remote circle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Link requested, not yet accepted by both ends.
    Pending,
    /// Link established; participates in forwarding.
    Up,
    /// Link suspended or refused.
    Down,
}

impl LinkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// A link from a local circle to a circle hosted on another node.
///
/// `linkage_id` is the remote circle's unique id: it is what the remote side
/// sends as `circleUniqueId` when it delivers frames to us, and together with
/// `token` it identifies the link on inbound requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedLink {
    pub id: String,
    pub circle_id: String,
    pub linkage_id: String,
    pub address: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
}
