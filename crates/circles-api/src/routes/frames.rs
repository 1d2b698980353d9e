//! Frame authoring routes.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    routing::post,
    Json, Router,
};
use circles_common::{
    auth::Session,
    error::CirclesResult,
    models::frame::{CreateFrameRequest, SharingFrame},
    validation::validate_request,
};
use std::sync::Arc;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/circles/{circle_id}/frames", post(create_frame))
        .route("/circles/{circle_id}/frames/{frame_id}/unshare", post(unshare_frame))
        .route_layer(middleware::from_fn_with_state(state, crate::middleware::auth_middleware))
}

/// POST /api/v1/circles/{circle_id}/frames: share an item with a circle.
async fn create_frame(
    Extension(session): Extension<Session>,
    State(state): State<Arc<AppState>>,
    Path(circle_id): Path<String>,
    Json(body): Json<CreateFrameRequest>,
) -> CirclesResult<(StatusCode, Json<SharingFrame>)> {
    validate_request(&body)?;

    let broadcast = body.broadcast_flag();
    let frame = state
        .engine
        .create_frame(&session, &circle_id, body.into_frame(), broadcast)
        .await?;

    Ok((StatusCode::CREATED, Json(frame)))
}

/// POST /api/v1/circles/{circle_id}/frames/{frame_id}/unshare: tell the circle an item was withdrawn.
async fn unshare_frame(
    Extension(session): Extension<Session>,
    State(state): State<Arc<AppState>>,
    Path((circle_id, frame_id)): Path<(String, String)>,
) -> CirclesResult<StatusCode> {
    state.engine.notify_unshared(&session, &circle_id, &frame_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
