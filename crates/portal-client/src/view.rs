use async_trait::async_trait;

use crate::state::{Feed, ScrollIntent, SidebarEntry};

/// Whatever presents the client to a person: a terminal, a test recorder.
///
/// Render hooks are called with the client state locked, so they must not
/// call back into the client.
#[async_trait]
pub trait ClientView: Send + Sync {
    /// Ask a yes/no question. Unsend waits on this.
    async fn confirm(&self, prompt: &str) -> bool;

    fn alert(&self, message: &str);

    fn feed_changed(&self, _feed: &Feed, _scroll: ScrollIntent) {}

    fn sidebar_changed(&self, _entries: &[SidebarEntry], _hint: Option<&str>) {}
}
