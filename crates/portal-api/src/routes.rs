use axum::{Router, middleware, routing::get};

use crate::directory;
use crate::error::ApiError;
use crate::messages;
use crate::middleware::require_auth;
use crate::state::AppState;

/// The full endpoint table. Anything not listed here is a 404, a listed
/// path with an unlisted verb is a 405, and both answer in the JSON
/// envelope like every other failure.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/usernames", get(directory::list_users))
        .route("/usernames/{filter}", get(directory::list_users_filtered))
        .route(
            "/messages",
            get(messages::missing_target)
                .post(messages::send_message)
                .put(messages::missing_edit_id)
                .delete(messages::missing_unsend_id),
        )
        .route(
            "/messages/{message_id}",
            get(messages::missing_target)
                .put(messages::edit_message)
                .delete(messages::unsend_message),
        )
        .route("/messages/{mode}/{other_id}", get(messages::get_conversation))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .route("/", get(no_request))
        .merge(protected)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
}

async fn no_request() -> ApiError {
    ApiError::MissingRequest
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
