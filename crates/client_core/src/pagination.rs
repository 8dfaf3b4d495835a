//! Cursor-based backfill for the selected conversation.

use shared::{
    domain::{ConversationKey, Message, Timestamp},
    protocol::{ChatPage, ClientCommand},
};
use tracing::debug;

use crate::store::insert_sorted;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationCursor {
    pub oldest_loaded: Option<Timestamp>,
    pub exhausted: bool,
}

/// Loaded slice of the selected conversation, ascending by timestamp.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    key: ConversationKey,
    messages: Vec<Message>,
    cursor: PaginationCursor,
    loading_more: bool,
    awaiting_first_page: bool,
}

impl HistoryWindow {
    fn new(key: ConversationKey) -> Self {
        Self {
            key,
            messages: Vec::new(),
            cursor: PaginationCursor::default(),
            loading_more: false,
            awaiting_first_page: true,
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn cursor(&self) -> &PaginationCursor {
        &self.cursor
    }

    pub fn has_more(&self) -> bool {
        !self.cursor.exhausted
    }

    /// True while any page request (first or older) is outstanding.
    pub fn is_loading_more(&self) -> bool {
        self.loading_more || self.awaiting_first_page
    }

    fn refresh_cursor(&mut self) {
        self.cursor.oldest_loaded = self.messages.first().map(|m| m.timestamp.clone());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// No selection, or the page belongs to a conversation no longer selected.
    Stale,
    /// Nothing older is available; the window is unchanged.
    Exhausted,
    Merged {
        inserted: usize,
        scroll_to_latest: bool,
    },
}

#[derive(Debug, Default)]
pub struct PaginationController {
    window: Option<HistoryWindow>,
}

impl PaginationController {
    /// Resets the cursor for `key` and returns the most-recent-page request.
    pub fn select(&mut self, key: ConversationKey) -> ClientCommand {
        self.window = Some(HistoryWindow::new(key.clone()));
        ClientCommand::selected_user_chat(key, None)
    }

    pub fn clear(&mut self) {
        self.window = None;
    }

    pub fn selected_key(&self) -> Option<&ConversationKey> {
        self.window.as_ref().map(HistoryWindow::key)
    }

    pub fn window(&self) -> Option<&HistoryWindow> {
        self.window.as_ref()
    }

    /// Requests the page older than the oldest loaded message. `None` when the intent
    /// does not apply: nothing selected, a request in flight, history exhausted, or
    /// nothing loaded to anchor the cursor.
    pub fn load_more(&mut self) -> Option<ClientCommand> {
        let window = self.window.as_mut()?;
        if window.is_loading_more() || window.cursor.exhausted {
            return None;
        }
        let cursor = window.cursor.oldest_loaded.clone()?;
        window.loading_more = true;
        Some(ClientCommand::selected_user_chat(
            window.key.clone(),
            Some(&cursor),
        ))
    }

    /// Merges a page response; older messages land before the loaded ones.
    pub fn apply_page(&mut self, page: &ChatPage) -> PageOutcome {
        let Some(window) = self.window.as_mut() else {
            return PageOutcome::Stale;
        };
        match page.conversation_key() {
            Some(key) if key != &window.key => {
                debug!(page = %key, selected = %window.key, "ignoring page for stale selection");
                return PageOutcome::Stale;
            }
            Some(_) => {}
            // A keyless page can only answer a request still open for this window.
            None if !window.is_loading_more() => {
                debug!(selected = %window.key, "ignoring keyless page with no request open");
                return PageOutcome::Stale;
            }
            None => {}
        }

        let first_page = window.awaiting_first_page;
        window.awaiting_first_page = false;
        window.loading_more = false;

        let mut inserted = 0;
        for message in &page.data {
            if message.conversation_key != window.key || window.messages.contains(message) {
                continue;
            }
            insert_sorted(&mut window.messages, message.clone());
            inserted += 1;
        }

        // An older page that adds nothing new would re-request the same cursor forever.
        // A first page already covered by live pushes still counts as loaded.
        if inserted == 0 && (page.data.is_empty() || !first_page) {
            window.cursor.exhausted = true;
            return PageOutcome::Exhausted;
        }

        window.cursor.exhausted = false;
        window.refresh_cursor();
        PageOutcome::Merged {
            inserted,
            scroll_to_latest: first_page,
        }
    }

    /// Adds a live message to the window when it belongs to the selection.
    ///
    /// A message older than the loaded range is left for backfill while more history
    /// remains, so the cursor never skips the gap in between.
    pub fn insert_live(&mut self, message: &Message) -> bool {
        let Some(window) = self.window.as_mut() else {
            return false;
        };
        if message.conversation_key != window.key || window.messages.contains(message) {
            return false;
        }
        let before_loaded = window
            .cursor
            .oldest_loaded
            .as_ref()
            .is_some_and(|oldest| message.timestamp < *oldest);
        if before_loaded && !window.cursor.exhausted {
            return false;
        }
        insert_sorted(&mut window.messages, message.clone());
        window.refresh_cursor();
        true
    }
}

#[cfg(test)]
#[path = "tests/pagination_tests.rs"]
mod tests;
