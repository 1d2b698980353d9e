//! # circles-api
//!
//! HTTP surface for Circles: client-facing frame authoring under `/api/v1`
//! and the node-to-node payload endpoint under `/_circles/v1`.

pub mod middleware;
pub mod routes;

use axum::Router;
use circles_db::Database;
use circles_federation::{HttpTransport, SharingFrameService};
use std::sync::Arc;

/// The engine as wired in production.
pub type Engine = SharingFrameService<Database, HttpTransport>;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: Arc<Engine>,
    /// HMAC secret for client access tokens.
    pub jwt_secret: String,
}

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let api_routes = Router::new()
        .merge(routes::frames::router(state.clone()))
        .merge(routes::health::router());

    Router::new()
        .nest("/api/v1", api_routes)
        // Node-to-node endpoints live outside /api/v1.
        .merge(routes::payload::router())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
