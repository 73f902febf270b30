use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use portal_types::api::ConversationMessage;
use portal_types::message::{BodyError, UNSENT_BODY, is_unsent, normalize_body};

use crate::error::ClientError;
use crate::state::{
    ClientState, EMPTY_CONVERSATION_HINT, EditSession, Feed, FeedItem, LOAD_FAILED_HINT,
    NO_USERS_HINT, ScrollIntent, SelectedUser, SidebarEntry, USERS_FAILED_HINT, Viewport,
};
use crate::transport::{ConversationPage, MessagingApi};
use crate::view::ClientView;

const TOO_LONG_ALERT: &str = "Message too long";
const UNSEND_PROMPT: &str = "Unsend this message?";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub poll_interval: Duration,
    pub filter_debounce: Duration,
    /// Pixels from the bottom within which a refresh follows new messages.
    pub near_bottom_px: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2500),
            filter_debounce: Duration::from_millis(250),
            near_bottom_px: 90.0,
        }
    }
}

/// Handle to one signed-in conversation client. Cloning is cheap; every
/// clone drives the same state.
#[derive(Clone)]
pub struct ConversationClient {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn MessagingApi>,
    view: Arc<dyn ClientView>,
    config: ClientConfig,
    state: Mutex<ClientState>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.stop_polling();
        if let Some(task) = state.filter_task.take() {
            task.abort();
        }
    }
}

impl ConversationClient {
    pub fn new(api: Arc<dyn MessagingApi>, view: Arc<dyn ClientView>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                view,
                config,
                state: Mutex::new(ClientState::default()),
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Read the current state without holding the lock past `f`.
    pub async fn inspect<R>(&self, f: impl FnOnce(&ClientState) -> R) -> R {
        let state = self.inner.state.lock().await;
        f(&state)
    }

    pub async fn set_viewport(&self, viewport: Viewport) {
        self.inner.state.lock().await.viewport = viewport;
    }

    // ── Sidebar ─────────────────────────────────────────────────────

    pub async fn load_users(&self, filter: &str) {
        let filter = filter.trim().to_string();
        self.inner.state.lock().await.filter = filter.clone();

        let result = self.inner.api.list_users(&filter).await;

        let mut state = self.inner.state.lock().await;
        if state.filter != filter {
            debug!("Dropping user list for superseded filter {:?}", filter);
            return;
        }

        let (entries, hint) = match result {
            Ok(listing) => {
                state.me = Some(listing.me);
                let selected = state.selected_user_id();
                let entries: Vec<SidebarEntry> = listing
                    .users
                    .into_iter()
                    .map(|u| SidebarEntry {
                        active: Some(u.user_id) == selected,
                        user_id: u.user_id,
                        username: u.username,
                    })
                    .collect();
                let hint = entries.is_empty().then(|| NO_USERS_HINT.to_string());
                (entries, hint)
            }
            Err(e) => {
                warn!("Failed to load users: {}", e);
                state.last_error = Some(e.to_string());
                (Vec::new(), Some(USERS_FAILED_HINT.to_string()))
            }
        };

        if state.sidebar != entries || state.sidebar_hint != hint {
            state.sidebar = entries;
            state.sidebar_hint = hint;
            self.inner
                .view
                .sidebar_changed(&state.sidebar, state.sidebar_hint.as_deref());
        }
    }

    /// Debounced filter keystroke: only the last input within the debounce
    /// window reaches the directory.
    pub async fn filter_input(&self, text: &str) {
        let text = text.to_string();
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.config.filter_debounce;

        let mut state = self.inner.state.lock().await;
        if let Some(pending) = state.filter_task.take() {
            pending.abort();
        }
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(client) = Self::from_weak(&weak) {
                client.load_users(&text).await;
            }
        });
        state.filter_task = Some(task.abort_handle());
    }

    pub async fn select_user(&self, user_id: i64, username: &str) {
        {
            let mut state = self.inner.state.lock().await;
            if state.edit.take().is_some() {
                debug!("Abandoning edit on conversation switch");
            }
            state.open_menu = None;
            state.selected = Some(SelectedUser {
                user_id,
                username: username.to_string(),
            });
            state.feed = Feed::default();
            state.mark_active();
            self.inner
                .view
                .sidebar_changed(&state.sidebar, state.sidebar_hint.as_deref());
        }

        self.load_conversation(true).await;
        self.start_polling().await;
    }

    // ── Conversation ────────────────────────────────────────────────

    /// Fetch and render the selected conversation unless an edit or an
    /// open menu would be disturbed by it.
    pub async fn load_conversation(&self, force_scroll_to_bottom: bool) {
        let (target, seq) = {
            let mut state = self.inner.state.lock().await;
            if let Some(reason) = state.refresh_blocker() {
                debug!("Skipping conversation refresh: {}", reason);
                return;
            }
            let Some(target) = state.selected_user_id() else {
                return;
            };
            state.next_request += 1;
            (target, state.next_request)
        };

        let result = self.inner.api.conversation(target).await;

        let mut state = self.inner.state.lock().await;
        if state.selected_user_id() != Some(target) {
            debug!("Dropping conversation with {}: no longer selected", target);
            return;
        }
        if seq <= state.applied_request {
            debug!("Dropping stale conversation response #{}", seq);
            return;
        }
        if let Some(reason) = state.refresh_blocker() {
            debug!("Discarding conversation response: {}", reason);
            return;
        }
        state.applied_request = seq;

        match result {
            Ok(page) => self.render(&mut state, page, force_scroll_to_bottom),
            Err(e) => {
                warn!("Failed to load conversation with {}: {}", target, e);
                state.last_error = Some(e.to_string());
                let feed = Feed::hint(LOAD_FAILED_HINT);
                if state.feed != feed {
                    state.feed = feed;
                    self.inner.view.feed_changed(&state.feed, ScrollIntent::Preserve);
                }
            }
        }
    }

    fn render(&self, state: &mut ClientState, page: ConversationPage, force: bool) {
        state.me = Some(page.me);
        let near_bottom = state.viewport.is_near_bottom(self.inner.config.near_bottom_px);

        let items: Vec<FeedItem> = page
            .messages
            .into_iter()
            .map(|m| feed_item(m, page.me))
            .collect();
        let feed = if items.is_empty() {
            Feed::hint(EMPTY_CONVERSATION_HINT)
        } else {
            Feed { items, hint: None }
        };

        let intent = if force || near_bottom {
            ScrollIntent::Bottom
        } else {
            ScrollIntent::Preserve
        };
        state.last_scroll = Some(intent);

        if state.feed != feed || force {
            state.feed = feed;
            self.inner.view.feed_changed(&state.feed, intent);
        }
    }

    // ── Composer ────────────────────────────────────────────────────

    pub async fn send(&self, text: &str) {
        let (target, body) = {
            let mut state = self.inner.state.lock().await;
            state.composer = text.to_string();
            let Some(target) = state.selected_user_id() else {
                return;
            };
            if state.send_in_flight {
                debug!("Send ignored: previous send still in flight");
                return;
            }
            match normalize_body(&state.composer).map(str::to_string) {
                Ok(body) => {
                    state.send_in_flight = true;
                    (target, body)
                }
                Err(BodyError::Empty) => return,
                Err(BodyError::TooLong) => {
                    drop(state);
                    self.inner.view.alert(TOO_LONG_ALERT);
                    return;
                }
            }
        };

        let result = self.inner.api.send(target, &body).await;

        self.inner.state.lock().await.send_in_flight = false;
        match result {
            Ok(()) => {
                self.inner.state.lock().await.composer.clear();
                self.load_conversation(true).await;
            }
            Err(e) => self.report(&e, "Send failed").await,
        }
    }

    // ── Action menu ─────────────────────────────────────────────────

    /// Open the menu for `message_id`, or close it if it is already open.
    /// Returns whether a menu is open afterwards.
    pub async fn toggle_menu(&self, message_id: i64) -> bool {
        let mut state = self.inner.state.lock().await;
        let actionable = state.feed.find(message_id).is_some_and(FeedItem::has_actions);
        if !actionable || state.edit.is_some() {
            return state.open_menu.is_some();
        }

        state.open_menu = if state.open_menu == Some(message_id) {
            None
        } else {
            Some(message_id)
        };
        state.open_menu.is_some()
    }

    pub async fn close_menus(&self) {
        self.inner.state.lock().await.open_menu = None;
    }

    // ── Edit ────────────────────────────────────────────────────────

    pub async fn start_edit(&self, message_id: i64) -> bool {
        let mut state = self.inner.state.lock().await;
        let Some(text) = state
            .feed
            .find(message_id)
            .filter(|item| item.has_actions())
            .map(|item| item.text.clone())
        else {
            return false;
        };

        state.open_menu = None;
        state.stop_polling();
        state.edit = Some(EditSession {
            message_id,
            original: text.clone(),
            draft: text,
        });
        true
    }

    pub async fn update_draft(&self, text: &str) {
        if let Some(edit) = self.inner.state.lock().await.edit.as_mut() {
            edit.draft = text.to_string();
        }
    }

    pub async fn confirm_edit(&self) {
        let (message_id, body) = {
            let state = self.inner.state.lock().await;
            let Some((message_id, checked)) = state
                .edit
                .as_ref()
                .map(|edit| (edit.message_id, normalize_body(&edit.draft).map(str::to_string)))
            else {
                return;
            };
            match checked {
                Ok(body) => (message_id, body),
                Err(BodyError::Empty) => return,
                Err(BodyError::TooLong) => {
                    drop(state);
                    self.inner.view.alert(TOO_LONG_ALERT);
                    return;
                }
            }
        };

        match self.inner.api.edit(message_id, &body).await {
            Ok(()) => {
                {
                    let mut state = self.inner.state.lock().await;
                    if state.edit.as_ref().map(|e| e.message_id) == Some(message_id) {
                        state.edit = None;
                    }
                }
                self.start_polling().await;
                self.load_conversation(false).await;
            }
            Err(e) => self.report(&e, "Update failed").await,
        }
    }

    pub async fn cancel_edit(&self) {
        if self.inner.state.lock().await.edit.take().is_none() {
            return;
        }
        self.start_polling().await;
        self.load_conversation(false).await;
    }

    // ── Unsend ──────────────────────────────────────────────────────

    pub async fn unsend(&self, message_id: i64) {
        {
            let mut state = self.inner.state.lock().await;
            state.open_menu = None;
            let actionable = state.feed.find(message_id).is_some_and(FeedItem::has_actions);
            if !actionable {
                return;
            }
            state.confirm_pending = true;
        }

        let confirmed = self.inner.view.confirm(UNSEND_PROMPT).await;
        self.inner.state.lock().await.confirm_pending = false;
        if !confirmed {
            return;
        }

        match self.inner.api.unsend(message_id).await {
            Ok(()) => self.load_conversation(false).await,
            Err(e) => self.report(&e, "Unsend failed").await,
        }
    }

    // ── Polling ─────────────────────────────────────────────────────

    /// (Re)start the refresh loop. Any running loop is aborted first, so at
    /// most one exists.
    pub async fn start_polling(&self) {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.poll_interval;

        let mut state = self.inner.state.lock().await;
        state.stop_polling();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(client) = Self::from_weak(&weak) else {
                    break;
                };
                client.load_conversation(false).await;
            }
        });
        state.poll_task = Some(task.abort_handle());
    }

    pub async fn stop_polling(&self) {
        self.inner.state.lock().await.stop_polling();
    }

    /// Stop every background task.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        state.stop_polling();
        if let Some(task) = state.filter_task.take() {
            task.abort();
        }
    }

    async fn report(&self, err: &ClientError, fallback: &str) {
        warn!("{}: {}", fallback, err);
        let message = err.user_message(fallback);
        self.inner.state.lock().await.last_error = Some(message.clone());
        self.inner.view.alert(&message);
    }
}

fn feed_item(m: ConversationMessage, me: i64) -> FeedItem {
    let unsent = is_unsent(&m.message);
    FeedItem {
        message_id: m.message_id,
        sender_id: m.sender_id,
        sender_name: m.username,
        text: if unsent { UNSENT_BODY.to_string() } else { m.message },
        sent_at: m.date_time,
        mine: m.sender_id == me,
        unsent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn wire(sender_id: i64, text: &str) -> ConversationMessage {
        ConversationMessage {
            message_id: 7,
            sender_id,
            username: "someone".into(),
            message: text.into(),
            date_time: DateTime::default(),
        }
    }

    #[test]
    fn sentinel_match_ignores_case_and_padding() {
        let item = feed_item(wire(1, "  message UNSENT "), 1);
        assert!(item.unsent);
        assert!(item.mine);
        assert_eq!(item.text, UNSENT_BODY);
        assert!(!item.has_actions());
    }

    #[test]
    fn other_senders_are_not_mine() {
        let item = feed_item(wire(2, "hello"), 1);
        assert!(!item.mine);
        assert!(!item.unsent);
        assert_eq!(item.text, "hello");
    }
}
