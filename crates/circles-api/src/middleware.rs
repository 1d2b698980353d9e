//! Middleware: bearer token extraction.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use circles_common::{
    auth::{validate_token, Session, LOCAL_DELIVERY_SUBJECT},
    error::CirclesError,
};

use crate::AppState;

/// Validate `Authorization: Bearer <token>` and insert the caller's [`Session`]
/// into the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, CirclesError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(CirclesError::Unauthorized)?;

    let claims = validate_token(token, &state.jwt_secret).map_err(|_| CirclesError::InvalidToken)?;
    if claims.sub == LOCAL_DELIVERY_SUBJECT {
        return Err(CirclesError::InvalidToken);
    }

    request.extensions_mut().insert(Session::from(claims));
    Ok(next.run(request).await)
}
