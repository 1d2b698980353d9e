//! Sharing frame model: the unit of propagation between linked circles.
//!
//! A frame is created on the authoring node with a fresh unique id and no
//! cloud id. Copies received from linked nodes keep the original unique id but
//! are rebound to the receiving node's circle. After creation a frame is never
//! mutated except to set its cloud id once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Source tag reserved for frames produced by the propagation layer itself.
pub const CIRCLES_SOURCE: &str = "circles";

/// Header keys stamped on every authored frame.
pub mod headers {
    pub const AUTHOR: &str = "author";
    pub const CIRCLE_NAME: &str = "circleName";
    pub const CIRCLE_UNIQUE_ID: &str = "circleUniqueId";
    pub const BROADCAST: &str = "broadcast";
}

/// A shared payload travelling through a circle and its federated links.
///
/// Serialises to the camelCase JSON shape used on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingFrame {
    #[serde(default)]
    pub unique_id: Option<String>,
    /// Circle this copy belongs to, on the node holding it.
    #[serde(default)]
    pub circle_id: Option<String>,
    /// Application that produced the payload (e.g. `files`).
    pub source: String,
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub author: Option<String>,
    /// Address of the node that settled this frame; `None` until then.
    #[serde(default)]
    pub cloud_id: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl SharingFrame {
    /// A fresh, unstamped frame as handed over by an application.
    pub fn new(
        source: impl Into<String>,
        frame_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            unique_id: None,
            circle_id: None,
            source: source.into(),
            frame_type: frame_type.into(),
            author: None,
            cloud_id: None,
            headers: BTreeMap::new(),
            payload,
            created_at: None,
        }
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers.insert(key.to_owned(), value.into());
    }

    /// Whether this frame already went through the propagation layer.
    ///
    /// Any of these markers means the frame was not a fresh local action: the
    /// reserved source tag, an assigned unique id, or stamped circle headers.
    pub fn is_from_circles(&self) -> bool {
        self.source == CIRCLES_SOURCE
            || self.unique_id.is_some()
            || self.headers.contains_key(headers::CIRCLE_UNIQUE_ID)
    }

    pub fn is_delivered(&self) -> bool {
        self.cloud_id.is_some()
    }
}

/// Body of `POST /api/v1/circles/{circle_id}/frames`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateFrameRequest {
    #[validate(length(max = 64), custom(function = "crate::validation::validate_tag"))]
    pub source: String,
    #[serde(rename = "type")]
    #[validate(length(max = 64), custom(function = "crate::validation::validate_tag"))]
    pub frame_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub broadcast: Option<bool>,
}

impl CreateFrameRequest {
    /// Broadcast header value: `"1"` when set, empty otherwise.
    pub fn broadcast_flag(&self) -> Option<&'static str> {
        self.broadcast.map(|b| if b { "1" } else { "" })
    }

    pub fn into_frame(self) -> SharingFrame {
        SharingFrame::new(self.source, self.frame_type, self.payload)
    }
}
