use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::ApiError;
use crate::session;
use crate::state::AppState;

/// Resolve the caller from the bearer token and stash the [`session::Identity`]
/// in request extensions. Runs before any validation in the handlers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)?;

    let identity = session::resolve_identity(&state.jwt_secret, token).map_err(|e| {
        debug!("Rejected session token: {}", e);
        ApiError::Unauthenticated
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
