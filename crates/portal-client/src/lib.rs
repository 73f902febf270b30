//! Polling client for portal direct messages.
//!
//! [`ConversationClient`] owns the whole client-side state and keeps the
//! rendered conversation converged with the server by re-polling, without
//! ever disturbing an edit or an open action menu.

pub mod controller;
pub mod error;
pub mod state;
pub mod transport;
pub mod view;

pub use controller::{ClientConfig, ConversationClient};
pub use error::ClientError;
pub use transport::{HttpApi, MessagingApi};
pub use view::ClientView;
