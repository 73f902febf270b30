pub mod directory;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod routes;
pub mod session;
pub mod state;

pub use routes::router;
pub use state::{AppState, AppStateInner};
