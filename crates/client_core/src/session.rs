//! Owned session state shared by the dispatcher and the intent handlers.
//!
//! The conversation index is rebuilt inside every mutating method, so callers can never
//! observe an index older than the store.

use shared::{
    domain::{ConversationKey, Message, Profile},
    protocol::{ChatPage, ClientCommand, HistoryChunk},
};

use crate::{
    index::{Conversation, ConversationIndex},
    pagination::{HistoryWindow, PageOutcome, PaginationController},
    profiles::ProfileCache,
    store::MessageStore,
};

#[derive(Debug, Default)]
pub struct SessionState {
    store: MessageStore,
    index: ConversationIndex,
    profiles: ProfileCache,
    pagination: PaginationController,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn index(&self) -> &ConversationIndex {
        &self.index
    }

    pub fn profiles(&self) -> &ProfileCache {
        &self.profiles
    }

    pub fn selected_key(&self) -> Option<&ConversationKey> {
        self.pagination.selected_key()
    }

    pub fn window(&self) -> Option<&HistoryWindow> {
        self.pagination.window()
    }

    /// Most recent arrivals first, across every conversation.
    pub fn recent(&self, limit: usize) -> Vec<&Message> {
        self.store.feed().take(limit).collect()
    }

    pub fn search(&self, query: &str) -> Vec<&Conversation> {
        self.index.filter(query, &self.profiles)
    }

    pub fn ingest_history(&mut self, chunk: HistoryChunk) -> usize {
        let replaces = chunk.replaces_store();
        let inserted = self.store.ingest_bulk(chunk.data, replaces);
        self.reindex();
        inserted
    }

    /// Live message: deduplicated against the store before it may enter the open window.
    /// Returns `(stored, windowed)`.
    pub fn ingest_push(&mut self, message: Message) -> (bool, bool) {
        if !self.store.ingest_push(message.clone()) {
            return (false, false);
        }
        self.reindex();
        let windowed = self.pagination.insert_live(&message);
        (true, windowed)
    }

    /// Page response: merged into the window when it matches the selection, and into the
    /// store so the sidebar sees the older history too.
    pub fn ingest_page(&mut self, page: &ChatPage) -> PageOutcome {
        let outcome = self.pagination.apply_page(page);
        if matches!(outcome, PageOutcome::Merged { .. }) && self.store.ingest_backfill(&page.data) > 0
        {
            self.reindex();
        }
        outcome
    }

    pub fn cache_profile(&mut self, profile: Profile) {
        self.profiles.insert(profile);
    }

    pub fn select(&mut self, key: ConversationKey) -> ClientCommand {
        self.pagination.select(key)
    }

    pub fn load_more(&mut self) -> Option<ClientCommand> {
        self.pagination.load_more()
    }

    /// Drops all history (re-authentication). The selection survives; its window restarts.
    pub fn reset_history(&mut self) -> Option<ClientCommand> {
        self.store.reset();
        self.reindex();
        let key = self.pagination.selected_key().cloned()?;
        Some(self.pagination.select(key))
    }

    fn reindex(&mut self) {
        self.index = ConversationIndex::build(&self.store);
    }
}
