//! Sharing protocol error types.

use circles_common::error::CirclesError;
use circles_db::DbError;
use thiserror::Error;

/// Errors produced while authoring, forwarding, or receiving frames.
///
/// Each variant is raised where the condition is detected; storage errors are
/// translated case by case rather than wrapped wholesale.
#[derive(Debug, Error)]
pub enum ShareError {
    // ── Authorization / lookup ──────────────────────────────────────────────

    #[error("user '{user_id}' is not a member of circle '{circle_id}'")]
    Unauthorized { circle_id: String, user_id: String },

    #[error("circle '{0}' not found")]
    CircleNotFound(String),

    /// Token and linkage id do not resolve to a link. Which one was wrong is not said.
    #[error("unknown federated link")]
    UnknownLink,

    // ── Frame lifecycle ─────────────────────────────────────────────────────

    #[error("frame already went through circles and cannot be authored again")]
    SourceConflict,

    /// An inbound frame this node already stores for the linked circle.
    #[error("frame '{0}' is already known")]
    AlreadyKnown(String),

    /// A freshly generated frame id collided with a stored frame.
    #[error("frame id '{0}' collided with a stored frame")]
    DuplicateFrame(String),

    #[error("frame not found")]
    FrameNotFound,

    #[error("frame '{0}' was already delivered")]
    FrameAlreadyDelivered(String),

    // ── Remote communication ────────────────────────────────────────────────

    #[error("remote '{address}' rejected the frame: {reason}")]
    PayloadDelivery { address: String, reason: String },

    #[error("HTTP error communicating with '{0}': {1}")]
    Transport(String, String),

    #[error("delivery to '{0}' timed out")]
    Timeout(String),

    #[error("invalid remote address: {0}")]
    UrlParse(#[from] url::ParseError),

    // ── General ─────────────────────────────────────────────────────────────

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(DbError),
}

impl ShareError {
    /// Stable machine-readable reason, sent as `reason` on rejected deliveries.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "not_a_member",
            Self::CircleNotFound(_) => "unknown_circle",
            Self::UnknownLink => "unknown_link",
            Self::SourceConflict => "source_conflict",
            Self::AlreadyKnown(_) => "shares_is_already_known",
            Self::DuplicateFrame(_) => "duplicate_frame",
            Self::FrameNotFound => "unknown_share",
            Self::FrameAlreadyDelivered(_) => "share_already_delivered",
            Self::PayloadDelivery { .. } => "payload_rejected",
            Self::Transport(..) | Self::Timeout(_) => "transport_error",
            Self::UrlParse(_) => "bad_address",
            Self::Serialisation(_) => "malformed_frame",
            Self::Storage(_) => "internal_error",
        }
    }

    /// Whether this is an idempotent no-op (the work was already done) rather than a failure.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::AlreadyKnown(_) | Self::FrameAlreadyDelivered(_))
    }
}

impl From<reqwest::Error> for ShareError {
    fn from(e: reqwest::Error) -> Self {
        let server = e.url().map(|u| u.host_str().unwrap_or("?").to_owned()).unwrap_or_default();
        if e.is_timeout() {
            ShareError::Timeout(server)
        } else {
            ShareError::Transport(server, e.to_string())
        }
    }
}

impl From<ShareError> for CirclesError {
    fn from(e: ShareError) -> Self {
        match e {
            ShareError::Unauthorized { .. } => CirclesError::Forbidden,
            ShareError::CircleNotFound(_) => CirclesError::NotFound { resource: "Circle".into() },
            ShareError::FrameNotFound => CirclesError::NotFound { resource: "Frame".into() },
            ShareError::UnknownLink => CirclesError::Unauthorized,
            ShareError::AlreadyKnown(_)
            | ShareError::FrameAlreadyDelivered(_)
            | ShareError::DuplicateFrame(_) => CirclesError::AlreadyExists { resource: "Frame".into() },
            ShareError::SourceConflict => CirclesError::Conflict { message: e.to_string() },
            ShareError::Serialisation(_) | ShareError::UrlParse(_) => {
                CirclesError::Validation { message: e.to_string() }
            }
            ShareError::Storage(DbError::Database(db)) => CirclesError::Database(db),
            other => CirclesError::Internal(anyhow::Error::new(other)),
        }
    }
}
