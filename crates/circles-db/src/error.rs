//! Storage error types.

use thiserror::Error;

/// Errors surfaced by the frame store, link registry, and membership resolver.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("frame '{frame_id}' not found in circle '{circle_id}'")]
    FrameNotFound { circle_id: String, frame_id: String },

    #[error("frame '{frame_id}' already stored for circle '{circle_id}'")]
    FrameExists { circle_id: String, frame_id: String },

    #[error("frame '{frame_id}' was already delivered")]
    FrameAlreadyDelivered { frame_id: String },

    /// Frame handed to the store without the identifiers it is keyed on.
    #[error("frame is missing its circle or unique id")]
    FrameIncomplete,

    #[error("circle '{0}' not found")]
    CircleNotFound(String),

    /// No link matches a token and linkage id. Does not say which half failed.
    #[error("no matching federated link")]
    LinkNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
