//! Outbound payload delivery.
//!
//! [`PayloadTransport`] is the seam between the sharing engine and the
//! network; [`HttpTransport`] is the production implementation, a pooled
//! `reqwest` client.

use std::future::Future;
use std::time::Duration;

use circles_common::{auth::generate_local_delivery_token, config::FederationConfig};
use reqwest::Client;
use tracing::debug;

use crate::{
    error::ShareError,
    remote::payload_url,
    types::{DeliveryResponse, LocalDelivery, PayloadDelivery},
};

/// Moves payloads between nodes.
pub trait PayloadTransport: Send + Sync {
    /// `PUT` a frame to the linked node at `address` and return its answer.
    ///
    /// A well-formed rejection (`status: -1`) is returned as `Ok`; the caller
    /// decides what it means.
    fn deliver(
        &self,
        address: &str,
        delivery: &PayloadDelivery,
    ) -> impl Future<Output = Result<DeliveryResponse, ShareError>> + Send;

    /// `POST` a local delivery request to this node's own endpoint at `address`.
    fn trigger_local(
        &self,
        address: &str,
        request: &LocalDelivery,
    ) -> impl Future<Output = Result<(), ShareError>> + Send;
}

// ─── HTTP ────────────────────────────────────────────────────────────────────

pub struct HttpTransport {
    http: Client,
    local_timeout: Duration,
    allow_plain_http: bool,
    /// Secret for the bearer token on local-delivery calls; unset means none is sent.
    local_secret: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &FederationConfig) -> Result<Self, ShareError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("Circles-Federation/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ShareError::from)?;

        Ok(Self {
            http,
            local_timeout: Duration::from_secs(config.local_timeout_secs),
            allow_plain_http: config.allow_plain_http,
            local_secret: None,
        })
    }

    /// Sign local-delivery calls with `secret`, which the node's own endpoint checks.
    pub fn with_local_auth(mut self, secret: impl Into<String>) -> Self {
        self.local_secret = Some(secret.into());
        self
    }
}

impl PayloadTransport for HttpTransport {
    async fn deliver(
        &self,
        address: &str,
        delivery: &PayloadDelivery,
    ) -> Result<DeliveryResponse, ShareError> {
        let url = payload_url(address, self.allow_plain_http)?;
        debug!(%url, "Delivering payload");

        // Rejections come back as 4xx with a JSON body, so the body is read
        // before the status is considered.
        let resp = self.http.put(url).json(delivery).send().await?;
        let status = resp.status();
        match resp.json::<DeliveryResponse>().await {
            Ok(answer) => Ok(answer),
            Err(_) if !status.is_success() => Err(ShareError::Transport(
                address.to_owned(),
                format!("unexpected HTTP status {status}"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn trigger_local(&self, address: &str, request: &LocalDelivery) -> Result<(), ShareError> {
        let url = payload_url(address, self.allow_plain_http)?;
        debug!(%url, frame_id = %request.frame_id, "Triggering local delivery");

        let mut call = self.http.post(url).timeout(self.local_timeout).json(request);
        if let Some(secret) = &self.local_secret {
            let token = generate_local_delivery_token(secret)
                .map_err(|e| ShareError::Transport(address.to_owned(), format!("signing local delivery: {e}")))?;
            call = call.bearer_auth(token);
        }
        let resp = call.send().await?;
        let status = resp.status();
        match resp.json::<DeliveryResponse>().await {
            Ok(answer) if answer.is_rejected() => Err(ShareError::PayloadDelivery {
                address: address.to_owned(),
                reason: answer.reason.unwrap_or_default(),
            }),
            Ok(_) => Ok(()),
            Err(_) if !status.is_success() => Err(ShareError::Transport(
                address.to_owned(),
                format!("unexpected HTTP status {status}"),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
