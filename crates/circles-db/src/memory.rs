//! In-process implementation of the storage contracts.
//!
//! Everything lives behind one `tokio::sync::RwLock`; a frame save takes the
//! write lock for its check-and-insert, so it is atomic just like the SQL
//! `ON CONFLICT DO NOTHING` path.

use std::collections::HashMap;

use chrono::Utc;
use circles_common::models::{
    circle::Circle,
    frame::SharingFrame,
    link::{FederatedLink, LinkStatus},
    member::{Member, MemberLevel},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::DbError,
    store::{frame_key, outsider, FrameStore, LinkRegistry, MembershipResolver},
};

#[derive(Debug, Default)]
struct Inner {
    circles: HashMap<String, Circle>,
    links: Vec<FederatedLink>,
    frames: HashMap<(String, String), SharingFrame>,
}

/// In-memory circles, links, and frames.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding ──────────────────────────────────────────────────────────────

    /// Create a circle whose owner is its first member.
    pub async fn create_circle(&self, unique_id: &str, name: &str, owner_id: &str, owner_name: &str) {
        let now = Utc::now();
        let owner = Member {
            circle_id: unique_id.to_owned(),
            user_id: owner_id.to_owned(),
            display_name: owner_name.to_owned(),
            level: MemberLevel::Owner,
            joined_at: now,
        };
        let circle = Circle {
            unique_id: unique_id.to_owned(),
            name: name.to_owned(),
            owner_id: owner_id.to_owned(),
            members: vec![owner],
            viewer: None,
            created_at: now,
        };
        self.inner.write().await.circles.insert(unique_id.to_owned(), circle);
    }

    /// Add (or re-level) a member. No-op if the circle does not exist.
    pub async fn add_member(&self, circle_id: &str, user_id: &str, display_name: &str, level: MemberLevel) {
        let mut inner = self.inner.write().await;
        let Some(circle) = inner.circles.get_mut(circle_id) else {
            return;
        };
        circle.members.retain(|m| m.user_id != user_id);
        circle.members.push(Member {
            circle_id: circle_id.to_owned(),
            user_id: user_id.to_owned(),
            display_name: display_name.to_owned(),
            level,
            joined_at: Utc::now(),
        });
    }

    pub async fn delete_circle(&self, circle_id: &str) {
        let mut inner = self.inner.write().await;
        inner.circles.remove(circle_id);
        inner.links.retain(|l| l.circle_id != circle_id);
    }

    /// Record a link; replaces any existing link of the circle to the same address.
    pub async fn add_link(
        &self,
        circle_id: &str,
        linkage_id: &str,
        address: &str,
        token: &str,
        status: LinkStatus,
    ) -> FederatedLink {
        let link = FederatedLink {
            id: Uuid::new_v4().to_string(),
            circle_id: circle_id.to_owned(),
            linkage_id: linkage_id.to_owned(),
            address: address.to_owned(),
            token: token.to_owned(),
            status,
            created_at: Utc::now(),
        };
        let mut inner = self.inner.write().await;
        inner.links.retain(|l| !(l.circle_id == circle_id && l.address == address));
        inner.links.push(link.clone());
        link
    }

    /// Number of stored copies of `frame_id`, across circles.
    pub async fn frame_copies(&self, frame_id: &str) -> usize {
        self.inner.read().await.frames.keys().filter(|(_, id)| id == frame_id).count()
    }
}

impl FrameStore for MemoryStore {
    async fn get_frame(&self, circle_id: &str, frame_id: &str) -> Result<SharingFrame, DbError> {
        self.inner
            .read()
            .await
            .frames
            .get(&(circle_id.to_owned(), frame_id.to_owned()))
            .cloned()
            .ok_or_else(|| DbError::FrameNotFound {
                circle_id: circle_id.to_owned(),
                frame_id: frame_id.to_owned(),
            })
    }

    async fn save_frame(&self, frame: &SharingFrame) -> Result<(), DbError> {
        let (circle_id, frame_id) = frame_key(frame)?;
        let key = (circle_id.to_owned(), frame_id.to_owned());

        let mut inner = self.inner.write().await;
        if inner.frames.contains_key(&key) {
            return Err(DbError::FrameExists { circle_id: key.0, frame_id: key.1 });
        }
        let mut stored = frame.clone();
        if stored.created_at.is_none() {
            stored.created_at = Some(Utc::now());
        }
        inner.frames.insert(key, stored);
        Ok(())
    }

    async fn update_cloud_id(&self, frame: &SharingFrame, address: &str) -> Result<(), DbError> {
        let (circle_id, frame_id) = frame_key(frame)?;
        let mut inner = self.inner.write().await;
        let stored = inner
            .frames
            .get_mut(&(circle_id.to_owned(), frame_id.to_owned()))
            .ok_or_else(|| DbError::FrameNotFound {
                circle_id: circle_id.to_owned(),
                frame_id: frame_id.to_owned(),
            })?;
        if stored.cloud_id.is_some() {
            return Err(DbError::FrameAlreadyDelivered { frame_id: frame_id.to_owned() });
        }
        stored.cloud_id = Some(address.to_owned());
        Ok(())
    }
}

impl LinkRegistry for MemoryStore {
    async fn links_for_circle(
        &self,
        circle_id: &str,
        status: LinkStatus,
    ) -> Result<Vec<FederatedLink>, DbError> {
        Ok(self
            .inner
            .read()
            .await
            .links
            .iter()
            .filter(|l| l.circle_id == circle_id && l.status == status)
            .cloned()
            .collect())
    }

    async fn link_from_token(&self, token: &str, linkage_id: &str) -> Result<FederatedLink, DbError> {
        self.inner
            .read()
            .await
            .links
            .iter()
            .find(|l| l.token == token && l.linkage_id == linkage_id)
            .cloned()
            .ok_or(DbError::LinkNotFound)
    }

    async fn force_get_circle(&self, circle_id: &str) -> Result<Circle, DbError> {
        self.inner
            .read()
            .await
            .circles
            .get(circle_id)
            .cloned()
            .ok_or_else(|| DbError::CircleNotFound(circle_id.to_owned()))
    }
}

impl MembershipResolver for MemoryStore {
    async fn get_circle(&self, circle_id: &str, user_id: &str) -> Result<Circle, DbError> {
        let mut circle = self.force_get_circle(circle_id).await?;
        let viewer = circle.member(user_id).cloned().unwrap_or_else(|| outsider(&circle, user_id));
        circle.viewer = Some(viewer);
        Ok(circle)
    }
}
