//! The sharing engine: authors frames, forwards them over federated links,
//! and accepts frames pushed by linked nodes.
//!
//! ```text
//!  author ──create_frame──► store ──trigger_local──► POST /_circles/v1/payload
//!                                                         │
//!                                   claim_frame ◄─────────┘
//!                                        │
//!                                 broadcast_frame ──notify──► members
//!                                        │
//!                              forward_sharing_frame ──PUT──► linked nodes
//!                                                               │
//!                                                       receive_frame
//! ```
//!
//! Storage, transport, and notification delivery are injected, so the same
//! engine runs over SQL in production and over [`circles_db::MemoryStore`]
//! in tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use circles_common::{
    auth::Session,
    config::AppConfig,
    ids::generate_frame_id,
    models::{
        circle::Circle,
        frame::{headers, SharingFrame},
        link::{FederatedLink, LinkStatus},
        member::MemberLevel,
    },
};
use circles_db::{DbError, FrameStore, LinkRegistry, MembershipResolver};
use futures_util::{stream, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::{
    client::PayloadTransport,
    error::ShareError,
    notify::{dispatch, ActivityKind, NotificationSink, ShareActivity},
    types::{LocalDelivery, PayloadDelivery},
};

/// Node-level settings the engine needs at runtime.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// This node's public address: target of local delivery and the cloud id it stamps.
    pub local_address: String,
    pub admin_recipient: String,
    /// Upper bound on a single link delivery, on top of the transport's own timeouts.
    pub delivery_timeout: Duration,
    pub max_concurrent_deliveries: usize,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let federation = &config.federation;
        Self {
            local_address: config.server.local_address.clone(),
            admin_recipient: config.notifications.admin_recipient.clone(),
            delivery_timeout: Duration::from_secs(
                federation.connect_timeout_secs + federation.request_timeout_secs,
            ),
            max_concurrent_deliveries: federation.max_concurrent_deliveries.max(1),
        }
    }
}

/// Outcome of one fan-out. Failed links are reported, never raised.
#[derive(Debug, Default)]
pub struct ForwardReport {
    pub delivered: Vec<String>,
    pub failed: Vec<(String, ShareError)>,
}

impl ForwardReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

pub struct SharingFrameService<S, T> {
    store: S,
    transport: T,
    sink: Arc<dyn NotificationSink>,
    settings: EngineSettings,
}

impl<S, T> SharingFrameService<S, T>
where
    S: FrameStore + LinkRegistry + MembershipResolver,
    T: PayloadTransport,
{
    pub fn new(store: S, transport: T, sink: Arc<dyn NotificationSink>, settings: EngineSettings) -> Self {
        Self { store, transport, sink, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ── Authoring ────────────────────────────────────────────────────────────

    /// Author `frame` in `circle_id` on behalf of `session`.
    ///
    /// The frame is stamped, persisted, and handed to local delivery. It is
    /// not forwarded here; forwarding happens once local delivery runs.
    #[instrument(skip(self, session, frame), fields(user_id = %session.user_id))]
    pub async fn create_frame(
        &self,
        session: &Session,
        circle_id: &str,
        mut frame: SharingFrame,
        broadcast: Option<&str>,
    ) -> Result<SharingFrame, ShareError> {
        let circle = self
            .store
            .get_circle(circle_id, &session.user_id)
            .await
            .map_err(|e| match e {
                DbError::CircleNotFound(id) => ShareError::CircleNotFound(id),
                other => ShareError::Storage(other),
            })?;
        if circle.viewer_level() < MemberLevel::Member {
            return Err(ShareError::Unauthorized {
                circle_id: circle.unique_id,
                user_id: session.user_id.clone(),
            });
        }
        if frame.is_from_circles() {
            return Err(ShareError::SourceConflict);
        }

        let frame_id = generate_frame_id();
        frame.circle_id = Some(circle.unique_id.clone());
        frame.unique_id = Some(frame_id.clone());
        frame.author = Some(session.user_id.clone());
        frame.cloud_id = None;
        frame.created_at = Some(Utc::now());
        frame.set_header(headers::AUTHOR, session.user_id.as_str());
        frame.set_header(headers::CIRCLE_NAME, circle.name.as_str());
        frame.set_header(headers::CIRCLE_UNIQUE_ID, circle.unique_id.as_str());
        frame.set_header(headers::BROADCAST, broadcast.unwrap_or_default());

        self.store.save_frame(&frame).await.map_err(|e| match e {
            DbError::FrameExists { frame_id, .. } => ShareError::DuplicateFrame(frame_id),
            other => ShareError::Storage(other),
        })?;
        info!(circle_id = %circle.unique_id, %frame_id, "Frame created");

        let request = LocalDelivery { circle_id: circle.unique_id, frame_id };
        if let Err(e) = self.transport.trigger_local(&self.settings.local_address, &request).await {
            warn!(frame_id = %request.frame_id, error = %e, "Local delivery could not be triggered");
        }

        Ok(frame)
    }

    /// Load a frame that has not been delivered yet.
    pub async fn get_frame_from_unique_id(
        &self,
        circle_id: &str,
        frame_id: &str,
    ) -> Result<SharingFrame, ShareError> {
        if frame_id.is_empty() {
            return Err(ShareError::FrameNotFound);
        }
        let frame = self.store.get_frame(circle_id, frame_id).await.map_err(|e| match e {
            DbError::FrameNotFound { .. } => ShareError::FrameNotFound,
            other => ShareError::Storage(other),
        })?;
        if frame.is_delivered() {
            return Err(ShareError::FrameAlreadyDelivered(frame_id.to_owned()));
        }
        Ok(frame)
    }

    /// Stamp this node's address as the frame's cloud id. Succeeds once per frame.
    pub async fn update_frame_with_cloud_id(&self, frame: &SharingFrame) -> Result<(), ShareError> {
        self.store
            .update_cloud_id(frame, &self.settings.local_address)
            .await
            .map_err(|e| match e {
                DbError::FrameAlreadyDelivered { frame_id } => ShareError::FrameAlreadyDelivered(frame_id),
                DbError::FrameNotFound { .. } | DbError::FrameIncomplete => ShareError::FrameNotFound,
                other => ShareError::Storage(other),
            })
    }

    // ── Local delivery ───────────────────────────────────────────────────────

    /// Take ownership of a freshly authored frame for delivery.
    ///
    /// Only the first caller succeeds; later ones get
    /// [`ShareError::FrameAlreadyDelivered`].
    pub async fn claim_frame(&self, circle_id: &str, frame_id: &str) -> Result<SharingFrame, ShareError> {
        let frame = self.get_frame_from_unique_id(circle_id, frame_id).await?;
        self.update_frame_with_cloud_id(&frame).await?;
        Ok(frame)
    }

    /// Notify the circle's members about a claimed frame and forward it to every up link.
    pub async fn broadcast_frame(&self, frame: &SharingFrame) -> Result<ForwardReport, ShareError> {
        let circle = self.circle_of(frame).await?;
        let activity = ShareActivity::for_frame(ActivityKind::Shared, &circle, frame);
        dispatch(self.sink.as_ref(), &circle, &activity, &self.settings.admin_recipient);
        self.forward_to_links(&circle, frame).await
    }

    /// Claim then broadcast, as one call.
    pub async fn deliver_local(&self, circle_id: &str, frame_id: &str) -> Result<ForwardReport, ShareError> {
        let frame = self.claim_frame(circle_id, frame_id).await?;
        self.broadcast_frame(&frame).await
    }

    // ── Forwarding ───────────────────────────────────────────────────────────

    /// Push `frame` to every up link of its circle.
    ///
    /// Links are served concurrently, each under its own timeout; a failed
    /// link is logged and reported without affecting the others.
    pub async fn forward_sharing_frame(&self, frame: &SharingFrame) -> Result<ForwardReport, ShareError> {
        let circle = self.circle_of(frame).await?;
        self.forward_to_links(&circle, frame).await
    }

    async fn forward_to_links(&self, circle: &Circle, frame: &SharingFrame) -> Result<ForwardReport, ShareError> {
        let links = self
            .store
            .links_for_circle(&circle.unique_id, LinkStatus::Up)
            .await
            .map_err(ShareError::Storage)?;
        if links.is_empty() {
            debug!(circle_id = %circle.unique_id, "No up links to forward to");
            return Ok(ForwardReport::default());
        }

        let item = serde_json::to_string(frame)?;
        let item = &item;
        let results: Vec<(String, Result<(), ShareError>)> = stream::iter(links)
            .map(|link| async move {
                let payload = PayloadDelivery::new(&circle.unique_id, item.clone(), &link.token);
                let result = self.deliver_sharing_frame_to_link(&link, &payload).await;
                (link.address, result)
            })
            .buffer_unordered(self.settings.max_concurrent_deliveries.max(1))
            .collect()
            .await;

        let mut report = ForwardReport::default();
        for (address, result) in results {
            match result {
                Ok(()) => report.delivered.push(address),
                Err(e) => report.failed.push((address, e)),
            }
        }
        info!(
            circle_id = %circle.unique_id,
            frame_id = frame.unique_id.as_deref().unwrap_or_default(),
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Frame forwarded"
        );
        Ok(report)
    }

    /// Deliver one payload to one link. Failures are logged here.
    pub async fn deliver_sharing_frame_to_link(
        &self,
        link: &FederatedLink,
        payload: &PayloadDelivery,
    ) -> Result<(), ShareError> {
        let outcome = tokio::time::timeout(
            self.settings.delivery_timeout,
            self.transport.deliver(&link.address, payload),
        )
        .await;

        let result = match outcome {
            Err(_) => Err(ShareError::Timeout(link.address.clone())),
            Ok(Err(e)) => Err(e),
            Ok(Ok(answer)) if answer.is_rejected() => Err(ShareError::PayloadDelivery {
                address: link.address.clone(),
                reason: answer.reason.unwrap_or_default(),
            }),
            Ok(Ok(_)) => Ok(()),
        };

        match &result {
            Ok(()) => debug!(address = %link.address, "Payload delivered"),
            Err(e) => warn!(address = %link.address, link_id = %link.id, error = %e, "Payload delivery failed"),
        }
        result
    }

    // ── Receiving ────────────────────────────────────────────────────────────

    /// Accept a frame pushed over the link identified by `token` and `linkage_id`.
    ///
    /// The copy is rebound to the local circle and stored once; a replay fails
    /// with [`ShareError::AlreadyKnown`]. The copy's cloud id is the sending
    /// node's address, so it is already settled and local delivery will not
    /// forward it again.
    #[instrument(skip(self, token, frame), fields(frame_id = frame.unique_id.as_deref().unwrap_or_default()))]
    pub async fn receive_frame(
        &self,
        token: &str,
        linkage_id: &str,
        mut frame: SharingFrame,
    ) -> Result<SharingFrame, ShareError> {
        let link = self.store.link_from_token(token, linkage_id).await.map_err(|e| match e {
            DbError::LinkNotFound => ShareError::UnknownLink,
            other => ShareError::Storage(other),
        })?;

        let frame_id = match frame.unique_id.as_deref() {
            Some(id) if !id.is_empty() => id.to_owned(),
            _ => return Err(ShareError::FrameNotFound),
        };
        match self.store.get_frame(&link.circle_id, &frame_id).await {
            Ok(_) => return Err(ShareError::AlreadyKnown(frame_id)),
            Err(DbError::FrameNotFound { .. }) => {}
            Err(other) => return Err(ShareError::Storage(other)),
        }

        let circle = self.store.force_get_circle(&link.circle_id).await.map_err(|e| match e {
            DbError::CircleNotFound(id) => ShareError::CircleNotFound(id),
            other => ShareError::Storage(other),
        })?;

        frame.circle_id = Some(circle.unique_id.clone());
        frame.cloud_id = Some(link.address.clone());
        frame.created_at = Some(Utc::now());
        self.store.save_frame(&frame).await.map_err(|e| match e {
            DbError::FrameExists { frame_id, .. } => ShareError::AlreadyKnown(frame_id),
            other => ShareError::Storage(other),
        })?;
        info!(circle_id = %circle.unique_id, remote = %link.address, "Frame received");

        let activity = ShareActivity::for_frame(ActivityKind::Shared, &circle, &frame);
        dispatch(self.sink.as_ref(), &circle, &activity, &self.settings.admin_recipient);
        Ok(frame)
    }

    /// Decode a wire payload and receive the frame it carries.
    pub async fn receive_payload(&self, delivery: &PayloadDelivery) -> Result<SharingFrame, ShareError> {
        let frame = delivery.decode_item()?;
        debug!(api_version = ?delivery.api_version, "Payload received");
        self.receive_frame(&delivery.token, &delivery.circle_unique_id, frame).await
    }

    // ── Unsharing ────────────────────────────────────────────────────────────

    /// Tell the circle that `session` withdrew a shared item.
    pub async fn notify_unshared(
        &self,
        session: &Session,
        circle_id: &str,
        frame_id: &str,
    ) -> Result<(), ShareError> {
        let circle = self
            .store
            .get_circle(circle_id, &session.user_id)
            .await
            .map_err(|e| match e {
                DbError::CircleNotFound(id) => ShareError::CircleNotFound(id),
                other => ShareError::Storage(other),
            })?;
        if circle.viewer_level() < MemberLevel::Member {
            return Err(ShareError::Unauthorized {
                circle_id: circle.unique_id,
                user_id: session.user_id.clone(),
            });
        }
        let frame = self.store.get_frame(circle_id, frame_id).await.map_err(|e| match e {
            DbError::FrameNotFound { .. } => ShareError::FrameNotFound,
            other => ShareError::Storage(other),
        })?;

        let mut activity = ShareActivity::for_frame(ActivityKind::Unshared, &circle, &frame);
        activity.author_name = circle.display_name_of(&session.user_id).to_owned();
        activity.author_id = session.user_id.clone();
        dispatch(self.sink.as_ref(), &circle, &activity, &self.settings.admin_recipient);
        Ok(())
    }

    async fn circle_of(&self, frame: &SharingFrame) -> Result<Circle, ShareError> {
        let circle_id = frame.circle_id.as_deref().unwrap_or_default();
        self.store.force_get_circle(circle_id).await.map_err(|e| match e {
            DbError::CircleNotFound(id) => ShareError::CircleNotFound(id),
            other => ShareError::Storage(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeliveryResponse;
    use circles_db::MemoryStore;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    // ── Test doubles ─────────────────────────────────────────────────────────

    #[derive(Debug, Clone, Copy)]
    enum Script {
        Reject(&'static str),
        Hang,
        Unreachable,
    }

    /// Accepts everything unless an address is scripted otherwise.
    #[derive(Default)]
    struct ScriptedTransport {
        script: HashMap<String, Script>,
        fail_local: bool,
        delivered: Mutex<Vec<(String, PayloadDelivery)>>,
        local: Mutex<Vec<(String, LocalDelivery)>>,
    }

    impl ScriptedTransport {
        fn with(mut self, address: &str, script: Script) -> Self {
            self.script.insert(address.to_owned(), script);
            self
        }

        fn delivered(&self) -> Vec<(String, PayloadDelivery)> {
            self.delivered.lock().unwrap().clone()
        }

        fn local(&self) -> Vec<(String, LocalDelivery)> {
            self.local.lock().unwrap().clone()
        }
    }

    impl PayloadTransport for ScriptedTransport {
        async fn deliver(
            &self,
            address: &str,
            delivery: &PayloadDelivery,
        ) -> Result<DeliveryResponse, ShareError> {
            self.delivered.lock().unwrap().push((address.to_owned(), delivery.clone()));
            match self.script.get(address).copied() {
                None => Ok(DeliveryResponse::accepted()),
                Some(Script::Reject(reason)) => Ok(DeliveryResponse::rejected(reason)),
                Some(Script::Hang) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(DeliveryResponse::accepted())
                }
                Some(Script::Unreachable) => {
                    Err(ShareError::Transport(address.to_owned(), "connection refused".into()))
                }
            }
        }

        async fn trigger_local(&self, address: &str, request: &LocalDelivery) -> Result<(), ShareError> {
            self.local.lock().unwrap().push((address.to_owned(), request.clone()));
            if self.fail_local {
                return Err(ShareError::Transport(address.to_owned(), "connection refused".into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<(ActivityKind, String, String)>>);

    impl RecordingSink {
        fn recipients(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|(_, r, _)| r.clone()).collect()
        }
    }

    impl NotificationSink for RecordingSink {
        fn publish(&self, activity: &ShareActivity, recipient: &str) {
            self.0.lock().unwrap().push((activity.kind, recipient.to_owned(), activity.summary()));
        }
    }

    type Engine = SharingFrameService<MemoryStore, ScriptedTransport>;

    fn settings(local_address: &str) -> EngineSettings {
        EngineSettings {
            local_address: local_address.into(),
            admin_recipient: "admin".into(),
            delivery_timeout: Duration::from_millis(200),
            max_concurrent_deliveries: 4,
        }
    }

    /// Node A: circle `C` owned by alice, carol is a member, dave is not.
    async fn node_a(transport: ScriptedTransport) -> (Engine, Arc<RecordingSink>) {
        let store = MemoryStore::new();
        store.create_circle("C", "Friends", "alice", "Alice").await;
        store.add_member("C", "carol", "Carol", MemberLevel::Member).await;
        let sink = Arc::new(RecordingSink::default());
        let engine = SharingFrameService::new(store, transport, sink.clone(), settings("a.example.com"));
        (engine, sink)
    }

    /// Node B: circle `R` owned by bob, linked back to `C` with token `t1`.
    async fn node_b() -> (Engine, Arc<RecordingSink>) {
        let store = MemoryStore::new();
        store.create_circle("R", "Remote friends", "bob", "Bob").await;
        store.add_link("R", "C", "a.example.com", "t1", LinkStatus::Up).await;
        let sink = Arc::new(RecordingSink::default());
        let engine =
            SharingFrameService::new(store, ScriptedTransport::default(), sink.clone(), settings("b.example.com"));
        (engine, sink)
    }

    fn fresh() -> SharingFrame {
        SharingFrame::new("files", "file", json!({ "id": 42, "name": "notes.txt" }))
    }

    fn carol() -> Session {
        Session::new("carol", "Carol")
    }

    /// A frame as it would arrive from a linked node.
    fn inbound(id: &str) -> SharingFrame {
        let mut frame = fresh();
        frame.unique_id = Some(id.into());
        frame.circle_id = Some("C".into());
        frame.author = Some("carol".into());
        frame.set_header(headers::CIRCLE_UNIQUE_ID, "C");
        frame
    }

    // ── Authoring ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn member_creates_stamped_undelivered_frame() {
        let (engine, _) = node_a(ScriptedTransport::default()).await;

        let frame = engine.create_frame(&carol(), "C", fresh(), Some("true")).await.unwrap();
        let frame_id = frame.unique_id.clone().unwrap();
        assert_eq!(frame_id.len(), 32);

        let stored = engine.store().get_frame("C", &frame_id).await.unwrap();
        assert_eq!(stored.author.as_deref(), Some("carol"));
        assert!(stored.cloud_id.is_none());
        assert_eq!(stored.header(headers::AUTHOR), Some("carol"));
        assert_eq!(stored.header(headers::CIRCLE_NAME), Some("Friends"));
        assert_eq!(stored.header(headers::CIRCLE_UNIQUE_ID), Some("C"));
        assert_eq!(stored.header(headers::BROADCAST), Some("true"));

        let local = engine.transport.local();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].0, "a.example.com");
        assert_eq!(local[0].1, LocalDelivery { circle_id: "C".into(), frame_id });
        assert!(engine.transport.delivered().is_empty());
    }

    #[tokio::test]
    async fn missing_broadcast_flag_is_an_empty_header() {
        let (engine, _) = node_a(ScriptedTransport::default()).await;
        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();
        assert_eq!(frame.header(headers::BROADCAST), Some(""));
    }

    #[tokio::test]
    async fn non_member_is_refused() {
        let (engine, _) = node_a(ScriptedTransport::default()).await;

        let err = engine
            .create_frame(&Session::new("dave", "Dave"), "C", fresh(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::Unauthorized { .. }));
        assert!(engine.transport.local().is_empty());
    }

    #[tokio::test]
    async fn unknown_circle_is_reported() {
        let (engine, _) = node_a(ScriptedTransport::default()).await;
        let err = engine.create_frame(&carol(), "Z", fresh(), None).await.unwrap_err();
        assert!(matches!(err, ShareError::CircleNotFound(id) if id == "Z"));
    }

    #[tokio::test]
    async fn created_frame_cannot_be_authored_again() {
        let (engine, _) = node_a(ScriptedTransport::default()).await;
        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();

        let err = engine.create_frame(&carol(), "C", frame, None).await.unwrap_err();
        assert!(matches!(err, ShareError::SourceConflict));

        let tagged = SharingFrame::new("circles", "file", json!({}));
        let err = engine.create_frame(&carol(), "C", tagged, None).await.unwrap_err();
        assert!(matches!(err, ShareError::SourceConflict));
    }

    #[tokio::test]
    async fn failed_local_trigger_keeps_the_frame() {
        let transport = ScriptedTransport { fail_local: true, ..Default::default() };
        let (engine, _) = node_a(transport).await;

        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();
        let frame_id = frame.unique_id.unwrap();
        assert!(engine.store().get_frame("C", &frame_id).await.is_ok());
    }

    // ── Local delivery ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn local_delivery_settles_notifies_and_forwards_once() {
        let (engine, sink) = node_a(ScriptedTransport::default()).await;
        engine.store().add_link("C", "R", "b.example.com", "t1", LinkStatus::Up).await;

        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();
        let frame_id = frame.unique_id.unwrap();

        let report = engine.deliver_local("C", &frame_id).await.unwrap();
        assert_eq!(report.delivered, vec!["b.example.com".to_owned()]);

        let stored = engine.store().get_frame("C", &frame_id).await.unwrap();
        assert_eq!(stored.cloud_id.as_deref(), Some("a.example.com"));
        assert_eq!(sink.recipients(), vec!["admin", "alice", "carol"]);

        let err = engine.deliver_local("C", &frame_id).await.unwrap_err();
        assert!(matches!(err, ShareError::FrameAlreadyDelivered(_)));
        assert_eq!(err.reason(), "share_already_delivered");
        assert_eq!(engine.transport.delivered().len(), 1);
    }

    #[tokio::test]
    async fn local_delivery_of_unknown_frame_fails() {
        let (engine, _) = node_a(ScriptedTransport::default()).await;
        let err = engine.deliver_local("C", "nope").await.unwrap_err();
        assert_eq!(err.reason(), "unknown_share");
        assert!(matches!(engine.deliver_local("C", "").await, Err(ShareError::FrameNotFound)));
    }

    #[tokio::test]
    async fn concurrent_claims_fan_out_once() {
        let (engine, _) = node_a(ScriptedTransport::default()).await;
        let engine = Arc::new(engine);
        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();
        let frame_id = frame.unique_id.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            let frame_id = frame_id.clone();
            handles.push(tokio::spawn(async move { engine.claim_frame("C", &frame_id).await }));
        }
        let mut claimed = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
    }

    // ── Forwarding ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn forward_sends_each_up_link_its_own_token() {
        let (engine, _) = node_a(ScriptedTransport::default()).await;
        let store = engine.store();
        store.add_link("C", "R1", "one.example.com", "t1", LinkStatus::Up).await;
        store.add_link("C", "R2", "two.example.com", "t2", LinkStatus::Up).await;
        store.add_link("C", "R3", "three.example.com", "t3", LinkStatus::Pending).await;
        store.add_link("C", "R4", "four.example.com", "t4", LinkStatus::Down).await;

        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();
        let report = engine.forward_sharing_frame(&frame).await.unwrap();
        assert_eq!(report.attempted(), 2);
        assert!(report.failed.is_empty());

        let mut sent: Vec<(String, String)> = engine
            .transport
            .delivered()
            .into_iter()
            .map(|(address, payload)| {
                assert_eq!(payload.circle_unique_id, "C");
                assert_eq!(payload.decode_item().unwrap(), frame);
                (address, payload.token)
            })
            .collect();
        sent.sort();
        assert_eq!(
            sent,
            vec![
                ("one.example.com".to_owned(), "t1".to_owned()),
                ("two.example.com".to_owned(), "t2".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn slow_link_does_not_hold_back_the_others() {
        let transport = ScriptedTransport::default().with("slow.example.com", Script::Hang);
        let (engine, _) = node_a(transport).await;
        let store = engine.store();
        store.add_link("C", "R1", "one.example.com", "t1", LinkStatus::Up).await;
        store.add_link("C", "R2", "slow.example.com", "t2", LinkStatus::Up).await;
        store.add_link("C", "R3", "three.example.com", "t3", LinkStatus::Up).await;

        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();
        let started = Instant::now();
        let report = engine.forward_sharing_frame(&frame).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.delivered.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "slow.example.com");
        assert!(matches!(report.failed[0].1, ShareError::Timeout(_)));
    }

    #[tokio::test]
    async fn rejections_and_transport_errors_are_contained() {
        let transport = ScriptedTransport::default()
            .with("picky.example.com", Script::Reject("unknown_link"))
            .with("down.example.com", Script::Unreachable);
        let (engine, _) = node_a(transport).await;
        let store = engine.store();
        store.add_link("C", "R1", "picky.example.com", "t1", LinkStatus::Up).await;
        store.add_link("C", "R2", "down.example.com", "t2", LinkStatus::Up).await;
        store.add_link("C", "R3", "fine.example.com", "t3", LinkStatus::Up).await;

        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();
        let report = engine.forward_sharing_frame(&frame).await.unwrap();

        assert_eq!(report.delivered, vec!["fine.example.com".to_owned()]);
        let rejected = report.failed.iter().find(|(a, _)| a == "picky.example.com").unwrap();
        assert!(matches!(&rejected.1, ShareError::PayloadDelivery { reason, .. } if reason == "unknown_link"));
        let unreachable = report.failed.iter().find(|(a, _)| a == "down.example.com").unwrap();
        assert!(matches!(unreachable.1, ShareError::Transport(..)));
    }

    #[tokio::test]
    async fn forward_after_circle_deletion_is_abandoned() {
        let (engine, _) = node_a(ScriptedTransport::default()).await;
        engine.store().add_link("C", "R", "b.example.com", "t1", LinkStatus::Up).await;
        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();

        engine.store().delete_circle("C").await;
        let err = engine.forward_sharing_frame(&frame).await.unwrap_err();
        assert!(matches!(err, ShareError::CircleNotFound(_)));
        assert!(engine.transport.delivered().is_empty());
    }

    // ── Receiving ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn receive_accepts_once_then_reports_known() {
        let (engine, sink) = node_b().await;

        let stored = engine.receive_frame("t1", "C", inbound("f1")).await.unwrap();
        assert_eq!(stored.circle_id.as_deref(), Some("R"));
        assert_eq!(stored.cloud_id.as_deref(), Some("a.example.com"));
        assert_eq!(stored.unique_id.as_deref(), Some("f1"));
        assert_eq!(stored.header(headers::CIRCLE_UNIQUE_ID), Some("C"));
        assert_eq!(sink.recipients(), vec!["admin", "bob"]);

        let err = engine.receive_frame("t1", "C", inbound("f1")).await.unwrap_err();
        assert!(matches!(err, ShareError::AlreadyKnown(_)));
        assert!(err.is_expected());
        assert_eq!(engine.store().frame_copies("f1").await, 1);
        assert!(engine.transport.delivered().is_empty());
    }

    #[tokio::test]
    async fn received_copy_is_never_forwarded_again() {
        let (engine, _) = node_b().await;
        engine.store().add_link("R", "D", "c.example.com", "t9", LinkStatus::Up).await;
        engine.receive_frame("t1", "C", inbound("f1")).await.unwrap();

        let stored = engine.store().get_frame("R", "f1").await.unwrap();
        assert_eq!(stored.cloud_id.as_deref(), Some("a.example.com"));

        let err = engine.deliver_local("R", "f1").await.unwrap_err();
        assert!(matches!(err, ShareError::FrameAlreadyDelivered(_)));
        assert!(matches!(engine.claim_frame("R", "f1").await, Err(ShareError::FrameAlreadyDelivered(_))));
        assert!(engine.transport.delivered().is_empty());
    }

    #[tokio::test]
    async fn receive_requires_token_and_linkage_to_match() {
        let (engine, _) = node_b().await;

        for (token, linkage) in [("t1", "other"), ("wrong", "C"), ("", "")] {
            let err = engine.receive_frame(token, linkage, inbound("f1")).await.unwrap_err();
            assert!(matches!(err, ShareError::UnknownLink));
        }
        assert_eq!(engine.store().frame_copies("f1").await, 0);
    }

    #[tokio::test]
    async fn receive_for_deleted_circle_fails() {
        let store = MemoryStore::new();
        store.add_link("gone", "C", "a.example.com", "t1", LinkStatus::Up).await;
        let engine = SharingFrameService::new(
            store,
            ScriptedTransport::default(),
            Arc::new(RecordingSink::default()),
            settings("b.example.com"),
        );

        let err = engine.receive_frame("t1", "C", inbound("f1")).await.unwrap_err();
        assert!(matches!(err, ShareError::CircleNotFound(_)));
    }

    #[tokio::test]
    async fn frame_without_id_is_refused() {
        let (engine, _) = node_b().await;
        let err = engine.receive_frame("t1", "C", fresh()).await.unwrap_err();
        assert!(matches!(err, ShareError::FrameNotFound));
    }

    #[tokio::test]
    async fn racing_receives_store_one_copy() {
        let (engine, _) = node_b().await;
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move { engine.receive_frame("t1", "C", inbound("f1")).await }));
        }
        let mut accepted = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(e) => assert!(matches!(e, ShareError::AlreadyKnown(_))),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(engine.store().frame_copies("f1").await, 1);
    }

    #[tokio::test]
    async fn garbled_item_is_a_serialisation_error() {
        let (engine, _) = node_b().await;
        let payload = PayloadDelivery::new("C", "{not json".into(), "t1");
        let err = engine.receive_payload(&payload).await.unwrap_err();
        assert_eq!(err.reason(), "malformed_frame");
    }

    // ── Unsharing ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn unshare_notifies_the_circle() {
        let (engine, sink) = node_a(ScriptedTransport::default()).await;
        let frame = engine.create_frame(&carol(), "C", fresh(), None).await.unwrap();
        let frame_id = frame.unique_id.unwrap();

        engine.notify_unshared(&Session::new("alice", "Alice"), "C", &frame_id).await.unwrap();
        let events = sink.0.lock().unwrap().clone();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|(kind, _, _)| *kind == ActivityKind::Unshared));
        assert_eq!(events[0].2, "Alice unshared notes.txt from the circle Friends");

        let err = engine
            .notify_unshared(&Session::new("dave", "Dave"), "C", &frame_id)
            .await
            .unwrap_err();
        assert!(matches!(err, ShareError::Unauthorized { .. }));
    }

    // ── Two nodes ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn share_travels_from_author_to_linked_node_once() {
        let (a, _) = node_a(ScriptedTransport::default()).await;
        a.store().add_link("C", "R", "b.example.com", "t1", LinkStatus::Up).await;
        let (b, b_sink) = node_b().await;

        let err = a.create_frame(&Session::new("dave", "Dave"), "C", fresh(), None).await.unwrap_err();
        assert!(matches!(err, ShareError::Unauthorized { .. }));

        let frame = a.create_frame(&carol(), "C", fresh(), None).await.unwrap();
        let (_, trigger) = a.transport.local().remove(0);
        a.deliver_local(&trigger.circle_id, &trigger.frame_id).await.unwrap();

        let (address, payload) = a.transport.delivered().remove(0);
        assert_eq!(address, "b.example.com");
        assert_eq!(payload.token, "t1");

        let received = b.receive_payload(&payload).await.unwrap();
        assert_eq!(received.unique_id, frame.unique_id);
        assert_eq!(received.author.as_deref(), Some("carol"));
        assert_eq!(received.circle_id.as_deref(), Some("R"));
        assert!(b_sink.recipients().contains(&"bob".to_owned()));

        let err = b.receive_payload(&payload).await.unwrap_err();
        assert!(matches!(err, ShareError::AlreadyKnown(_)));
    }
}
