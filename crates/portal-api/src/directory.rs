use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
};

use portal_types::api::{Envelope, UserEntry};

use crate::error::ApiError;
use crate::session::Identity;
use crate::state::{AppState, with_db};

type UserListing = Json<Envelope<Vec<UserEntry>>>;

/// GET /usernames: everyone but the caller, for the sidebar.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<UserListing, ApiError> {
    lookup(&state, identity.user_id, None).await
}

/// GET /usernames/{filter}: same, narrowed to names containing `filter`.
pub async fn list_users_filtered(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    filter: Result<Path<String>, PathRejection>,
) -> Result<UserListing, ApiError> {
    let Path(filter) = filter.map_err(|_| ApiError::InvalidInput("Invalid input"))?;
    lookup(&state, identity.user_id, Some(filter)).await
}

async fn lookup(state: &AppState, me: i64, filter: Option<String>) -> Result<UserListing, ApiError> {
    let rows = with_db(state, "Query failed", move |db| {
        db.list_users(me, filter.as_deref())
    })
    .await?;

    let users = rows
        .into_iter()
        .map(|row| UserEntry {
            user_id: row.id,
            username: row.username,
        })
        .collect();

    Ok(Json(Envelope::data(me, users)))
}
