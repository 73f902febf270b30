//! Everything the conversation client knows, in one owned value.
//!
//! The controller mutates a [`ClientState`] only inside short critical
//! sections; network calls happen with the lock released.

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;

pub const EMPTY_CONVERSATION_HINT: &str = "No messages yet. Say hi";
pub const LOAD_FAILED_HINT: &str = "Failed to load messages";
pub const USERS_FAILED_HINT: &str = "Failed to load users";
pub const NO_USERS_HINT: &str = "No users found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    pub user_id: i64,
    pub username: String,
    /// The conversation currently open.
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedUser {
    pub user_id: i64,
    pub username: String,
}

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub message_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub mine: bool,
    pub unsent: bool,
}

impl FeedItem {
    /// Edit and unsend are offered on the viewer's own live messages only.
    pub fn has_actions(&self) -> bool {
        self.mine && !self.unsent
    }
}

/// The conversation pane: either messages or a single placeholder line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    pub items: Vec<FeedItem>,
    pub hint: Option<String>,
}

impl Feed {
    pub fn hint(text: &str) -> Self {
        Self {
            items: Vec::new(),
            hint: Some(text.to_string()),
        }
    }

    pub fn find(&self, message_id: i64) -> Option<&FeedItem> {
        self.items.iter().find(|item| item.message_id == message_id)
    }
}

/// Scroll geometry of the conversation pane, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.distance_from_bottom() < threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollIntent {
    /// Jump to the newest message.
    Bottom,
    /// Leave the reader where they are.
    Preserve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub message_id: i64,
    pub original: String,
    pub draft: String,
}

#[derive(Debug, Default)]
pub struct ClientState {
    /// Learned from the first server response.
    pub me: Option<i64>,
    pub filter: String,
    pub sidebar: Vec<SidebarEntry>,
    pub sidebar_hint: Option<String>,
    pub selected: Option<SelectedUser>,
    pub feed: Feed,
    pub viewport: Viewport,
    pub last_scroll: Option<ScrollIntent>,
    pub edit: Option<EditSession>,
    pub open_menu: Option<i64>,
    /// A yes/no prompt is on screen.
    pub confirm_pending: bool,
    pub composer: String,
    pub send_in_flight: bool,
    pub last_error: Option<String>,

    pub(crate) poll_task: Option<AbortHandle>,
    pub(crate) filter_task: Option<AbortHandle>,
    pub(crate) next_request: u64,
    pub(crate) applied_request: u64,
}

impl ClientState {
    pub fn is_editing(&self) -> bool {
        self.edit.is_some()
    }

    pub fn is_polling(&self) -> bool {
        self.poll_task.is_some()
    }

    pub fn selected_user_id(&self) -> Option<i64> {
        self.selected.as_ref().map(|s| s.user_id)
    }

    /// Why a conversation refresh may not touch the feed right now, if it
    /// may not.
    pub fn refresh_blocker(&self) -> Option<&'static str> {
        if self.selected.is_none() {
            Some("no conversation selected")
        } else if self.edit.is_some() {
            Some("edit in progress")
        } else if self.open_menu.is_some() {
            Some("action menu open")
        } else if self.confirm_pending {
            Some("confirmation pending")
        } else {
            None
        }
    }

    pub(crate) fn stop_polling(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }

    pub(crate) fn mark_active(&mut self) {
        let selected = self.selected_user_id();
        for entry in &mut self.sidebar {
            entry.active = Some(entry.user_id) == selected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_bottom_uses_strict_threshold() {
        let at = |top: f64| Viewport {
            scroll_top: top,
            scroll_height: 1000.0,
            client_height: 400.0,
        };
        assert!(at(600.0).is_near_bottom(90.0));
        assert!(at(511.0).is_near_bottom(90.0));
        assert!(!at(510.0).is_near_bottom(90.0));
        assert!(!at(0.0).is_near_bottom(90.0));
    }

    #[test]
    fn empty_viewport_counts_as_bottom() {
        assert!(Viewport::default().is_near_bottom(90.0));
    }

    #[test]
    fn blockers_in_priority_order() {
        let mut state = ClientState::default();
        assert_eq!(state.refresh_blocker(), Some("no conversation selected"));

        state.selected = Some(SelectedUser {
            user_id: 2,
            username: "bob".into(),
        });
        assert_eq!(state.refresh_blocker(), None);

        state.confirm_pending = true;
        assert_eq!(state.refresh_blocker(), Some("confirmation pending"));

        state.open_menu = Some(9);
        assert_eq!(state.refresh_blocker(), Some("action menu open"));

        state.edit = Some(EditSession {
            message_id: 9,
            original: "a".into(),
            draft: "a".into(),
        });
        assert_eq!(state.refresh_blocker(), Some("edit in progress"));
    }

    #[test]
    fn actions_only_on_own_live_messages() {
        let item = FeedItem {
            message_id: 1,
            sender_id: 1,
            sender_name: "alice".into(),
            text: "hi".into(),
            sent_at: DateTime::default(),
            mine: true,
            unsent: false,
        };
        assert!(item.has_actions());
        assert!(!FeedItem { unsent: true, ..item.clone() }.has_actions());
        assert!(!FeedItem { mine: false, ..item }.has_actions());
    }
}
