//! Storage contracts used by the sharing engine, and their SQL implementation.

use std::future::Future;

use circles_common::models::{
    circle::Circle,
    frame::SharingFrame,
    link::{FederatedLink, LinkStatus},
};

use crate::{
    error::DbError,
    repository::{circles, frames, links, members},
    Database,
};

// ─── Contracts ───────────────────────────────────────────────────────────────

/// Durable storage of sharing frames, at most one copy per `(circle, frame id)`.
pub trait FrameStore: Send + Sync {
    /// Fetch a stored frame, or [`DbError::FrameNotFound`].
    fn get_frame(
        &self,
        circle_id: &str,
        frame_id: &str,
    ) -> impl Future<Output = Result<SharingFrame, DbError>> + Send;

    /// Persist a frame carrying both `circle_id` and `unique_id`.
    ///
    /// Fails with [`DbError::FrameExists`] if the pair is already stored; the
    /// stored copy is left untouched. Check and insert are atomic.
    fn save_frame(&self, frame: &SharingFrame) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Set the frame's cloud id. Only succeeds once per frame; later calls fail
    /// with [`DbError::FrameAlreadyDelivered`].
    fn update_cloud_id(
        &self,
        frame: &SharingFrame,
        address: &str,
    ) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// Federated links per circle.
pub trait LinkRegistry: Send + Sync {
    fn links_for_circle(
        &self,
        circle_id: &str,
        status: LinkStatus,
    ) -> impl Future<Output = Result<Vec<FederatedLink>, DbError>> + Send;

    /// Resolve an inbound `(token, linkage id)` pair to exactly one link, or
    /// [`DbError::LinkNotFound`] without saying which half failed to match.
    fn link_from_token(
        &self,
        token: &str,
        linkage_id: &str,
    ) -> impl Future<Output = Result<FederatedLink, DbError>> + Send;

    /// Load a circle with its members, ignoring viewer visibility.
    fn force_get_circle(&self, circle_id: &str) -> impl Future<Output = Result<Circle, DbError>> + Send;
}

/// Circle membership as seen by an acting user.
pub trait MembershipResolver: Send + Sync {
    /// Load a circle with its members and `viewer` set to `user_id`'s membership.
    ///
    /// Non-members get a viewer at [`MemberLevel::None`](circles_common::models::member::MemberLevel::None).
    fn get_circle(
        &self,
        circle_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Circle, DbError>> + Send;
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Split a frame into the two ids it is keyed on.
pub(crate) fn frame_key(frame: &SharingFrame) -> Result<(&str, &str), DbError> {
    match (frame.circle_id.as_deref(), frame.unique_id.as_deref()) {
        (Some(c), Some(u)) if !c.is_empty() && !u.is_empty() => Ok((c, u)),
        _ => Err(DbError::FrameIncomplete),
    }
}

/// Viewer entry for a user with no membership in `circle`.
pub(crate) fn outsider(circle: &Circle, user_id: &str) -> circles_common::models::member::Member {
    circles_common::models::member::Member {
        circle_id: circle.unique_id.clone(),
        user_id: user_id.to_owned(),
        display_name: user_id.to_owned(),
        level: Default::default(),
        joined_at: circle.created_at,
    }
}

// ─── SQL implementation ──────────────────────────────────────────────────────

impl Database {
    async fn load_circle(&self, circle_id: &str) -> Result<Circle, DbError> {
        let mut circle = circles::find_by_id(&self.pool, circle_id)
            .await?
            .ok_or_else(|| DbError::CircleNotFound(circle_id.to_owned()))?;
        circle.members = members::list_members(&self.pool, circle_id).await?;
        Ok(circle)
    }
}

impl FrameStore for Database {
    async fn get_frame(&self, circle_id: &str, frame_id: &str) -> Result<SharingFrame, DbError> {
        frames::find_frame(&self.pool, circle_id, frame_id).await?.ok_or_else(|| {
            DbError::FrameNotFound { circle_id: circle_id.to_owned(), frame_id: frame_id.to_owned() }
        })
    }

    async fn save_frame(&self, frame: &SharingFrame) -> Result<(), DbError> {
        let (circle_id, frame_id) = frame_key(frame)?;
        if frames::insert_frame(&self.pool, circle_id, frame_id, frame).await? {
            Ok(())
        } else {
            Err(DbError::FrameExists { circle_id: circle_id.to_owned(), frame_id: frame_id.to_owned() })
        }
    }

    async fn update_cloud_id(&self, frame: &SharingFrame, address: &str) -> Result<(), DbError> {
        let (circle_id, frame_id) = frame_key(frame)?;
        if frames::set_cloud_id(&self.pool, circle_id, frame_id, address).await? {
            return Ok(());
        }
        // Nothing updated: either the frame is gone or it was already settled.
        match frames::find_frame(&self.pool, circle_id, frame_id).await? {
            Some(_) => Err(DbError::FrameAlreadyDelivered { frame_id: frame_id.to_owned() }),
            None => Err(DbError::FrameNotFound {
                circle_id: circle_id.to_owned(),
                frame_id: frame_id.to_owned(),
            }),
        }
    }
}

impl LinkRegistry for Database {
    async fn links_for_circle(
        &self,
        circle_id: &str,
        status: LinkStatus,
    ) -> Result<Vec<FederatedLink>, DbError> {
        Ok(links::list_for_circle(&self.pool, circle_id, status).await?)
    }

    async fn link_from_token(&self, token: &str, linkage_id: &str) -> Result<FederatedLink, DbError> {
        links::find_by_token(&self.pool, token, linkage_id).await?.ok_or(DbError::LinkNotFound)
    }

    async fn force_get_circle(&self, circle_id: &str) -> Result<Circle, DbError> {
        self.load_circle(circle_id).await
    }
}

impl MembershipResolver for Database {
    async fn get_circle(&self, circle_id: &str, user_id: &str) -> Result<Circle, DbError> {
        let mut circle = self.load_circle(circle_id).await?;
        let viewer = circle.member(user_id).cloned().unwrap_or_else(|| outsider(&circle, user_id));
        circle.viewer = Some(viewer);
        Ok(circle)
    }
}
