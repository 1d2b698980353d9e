//! Wire types exchanged between Circles nodes.

use circles_common::models::frame::SharingFrame;
use serde::{Deserialize, Serialize};

/// Protocol version advertised on every outbound payload.
pub const API_VERSION: [u32; 3] = [0, 1, 0];

/// Path serving both local (`POST`) and remote (`PUT`) payload delivery.
pub const PAYLOAD_PATH: &str = "/_circles/v1/payload";

/// Asks the local node to finish delivering a freshly authored frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDelivery {
    pub circle_id: String,
    pub frame_id: String,
}

/// A frame pushed to a linked node.
///
/// `circle_unique_id` is the *sender's* circle id; together with `token` it
/// identifies the link on the receiving side. `item` is the frame serialised
/// as a JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadDelivery {
    pub api_version: [u32; 3],
    pub circle_unique_id: String,
    pub item: String,
    pub token: String,
}

impl PayloadDelivery {
    pub fn new(circle_unique_id: &str, item: String, token: &str) -> Self {
        Self {
            api_version: API_VERSION,
            circle_unique_id: circle_unique_id.to_owned(),
            item,
            token: token.to_owned(),
        }
    }

    pub fn decode_item(&self) -> Result<SharingFrame, serde_json::Error> {
        serde_json::from_str(&self.item)
    }
}

/// Answer to a payload delivery: `status` is `1` on acceptance, `-1` on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResponse {
    pub status: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DeliveryResponse {
    pub const ACCEPTED: i32 = 1;
    pub const REJECTED: i32 = -1;

    pub fn accepted() -> Self {
        Self { status: Self::ACCEPTED, reason: None }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { status: Self::REJECTED, reason: Some(reason.into()) }
    }

    pub fn is_rejected(&self) -> bool {
        self.status == Self::REJECTED
    }
}
