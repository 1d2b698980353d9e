//! Node-to-node payload endpoint.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST   | `/_circles/v1/payload` | Local delivery of a frame authored on this node (node token required) |
//! | PUT    | `/_circles/v1/payload` | A linked node pushing a frame |
//!
//! Both answer `{ "status": 1 }` or `{ "status": -1, "reason": … }`.
//! Idempotent outcomes (already known, already delivered) are rejections
//! with HTTP 200.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use circles_common::auth::validate_local_delivery_token;
use circles_federation::{
    types::{DeliveryResponse, LocalDelivery, PayloadDelivery, PAYLOAD_PATH},
    ShareError,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::AppState;

type Answer = (StatusCode, Json<DeliveryResponse>);

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(PAYLOAD_PATH, post(local_delivery).put(remote_delivery))
}

/// POST /_circles/v1/payload
///
/// Only this node may call it: the bearer token must be a local-delivery token
/// signed with the node's secret. Claims the frame before answering;
/// notification and fan-out continue in the background so the caller is not
/// held for the forward.
async fn local_delivery(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<LocalDelivery>,
) -> Answer {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if token.is_none_or(|t| validate_local_delivery_token(t, &state.jwt_secret).is_err()) {
        warn!(frame_id = %body.frame_id, "Local delivery without a valid node token");
        return (StatusCode::UNAUTHORIZED, Json(DeliveryResponse::rejected("unauthorized")));
    }

    let frame = match state.engine.claim_frame(&body.circle_id, &body.frame_id).await {
        Ok(frame) => frame,
        Err(e) => return rejection(e),
    };

    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.broadcast_frame(&frame).await {
            warn!(frame_id = frame.unique_id.as_deref().unwrap_or_default(), error = %e, "Broadcast failed");
        }
    });

    (StatusCode::OK, Json(DeliveryResponse::accepted()))
}

/// PUT /_circles/v1/payload
async fn remote_delivery(State(state): State<Arc<AppState>>, Json(body): Json<PayloadDelivery>) -> Answer {
    match state.engine.receive_payload(&body).await {
        Ok(_) => (StatusCode::OK, Json(DeliveryResponse::accepted())),
        Err(e) => rejection(e),
    }
}

fn rejection(e: ShareError) -> Answer {
    let status = match &e {
        _ if e.is_expected() => StatusCode::OK,
        ShareError::UnknownLink => StatusCode::UNAUTHORIZED,
        ShareError::CircleNotFound(_) | ShareError::FrameNotFound => StatusCode::NOT_FOUND,
        ShareError::Serialisation(_) => StatusCode::BAD_REQUEST,
        ShareError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };

    if status == StatusCode::OK {
        debug!(reason = e.reason(), "Payload already handled");
    } else if status.is_server_error() {
        error!(error = %e, "Payload handling failed");
    } else {
        warn!(reason = e.reason(), error = %e, "Payload rejected");
    }

    (status, Json(DeliveryResponse::rejected(e.reason())))
}
