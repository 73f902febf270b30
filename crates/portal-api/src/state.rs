use std::sync::Arc;

use anyhow::anyhow;
use tracing::error;

use portal_db::Database;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler may touch. Handlers receive it through axum
/// `State`; there is no process-wide store handle.
pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: impl Into<String>) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret: jwt_secret.into(),
        })
    }
}

/// Run a blocking store call off the async runtime. Any failure, including
/// a panicked worker, becomes a `StorageFailure` carrying `context` as its
/// public message.
pub async fn with_db<F, T>(state: &AppState, context: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::storage(context, anyhow!("store task failed: {}", e))
        })?
        .map_err(|e| ApiError::storage(context, e))
}
