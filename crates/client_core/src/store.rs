//! Canonical message collection with identity dedup and per-conversation ordering.

use std::collections::{HashMap, HashSet, VecDeque};

use shared::domain::{ConversationKey, Message};

/// Append-only store of every message this session has seen.
///
/// Invariants held after every call:
/// * no two stored messages share `(key, timestamp, text, source)`;
/// * each conversation's slice is sorted ascending by timestamp, arrival order breaking ties.
#[derive(Debug, Default)]
pub struct MessageStore {
    /// Sidebar feed: bulk/backfill in arrival order, pushes prepended.
    feed: VecDeque<Message>,
    identities: HashSet<Message>,
    conversations: HashMap<ConversationKey, Vec<Message>>,
    revision: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests one bulk chunk. The first chunk (or an unchunked load) replaces everything.
    /// Returns how many messages were actually inserted.
    pub fn ingest_bulk(&mut self, messages: Vec<Message>, is_first_chunk: bool) -> usize {
        if is_first_chunk {
            self.clear();
        }
        let mut inserted = 0;
        for message in messages {
            if self.insert_indexed(&message) {
                self.feed.push_back(message);
                inserted += 1;
            }
        }
        self.revision += 1;
        inserted
    }

    /// Ingests a single live message. Duplicates are a no-op and return `false`.
    pub fn ingest_push(&mut self, message: Message) -> bool {
        if !self.insert_indexed(&message) {
            return false;
        }
        self.feed.push_front(message);
        self.revision += 1;
        true
    }

    /// Ingests an older page fetched for one conversation.
    pub fn ingest_backfill(&mut self, messages: &[Message]) -> usize {
        let mut inserted = 0;
        for message in messages {
            if self.insert_indexed(message) {
                self.feed.push_back(message.clone());
                inserted += 1;
            }
        }
        if inserted > 0 {
            self.revision += 1;
        }
        inserted
    }

    pub fn query_by_conversation(&self, key: &ConversationKey) -> &[Message] {
        self.conversations
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn conversations(&self) -> impl Iterator<Item = (&ConversationKey, &[Message])> {
        self.conversations
            .iter()
            .map(|(key, messages)| (key, messages.as_slice()))
    }

    pub fn feed(&self) -> impl Iterator<Item = &Message> {
        self.feed.iter()
    }

    pub fn contains(&self, message: &Message) -> bool {
        self.identities.contains(message)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Bumped on every mutation; lets derived views detect staleness.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Full reset, used on re-authentication.
    pub fn reset(&mut self) {
        self.clear();
        self.revision += 1;
    }

    fn clear(&mut self) {
        self.feed.clear();
        self.identities.clear();
        self.conversations.clear();
    }

    fn insert_indexed(&mut self, message: &Message) -> bool {
        if !self.identities.insert(message.clone()) {
            return false;
        }
        let timeline = self
            .conversations
            .entry(message.conversation_key.clone())
            .or_default();
        insert_sorted(timeline, message.clone());
        true
    }
}

/// Inserts after every entry with a timestamp `<=` the new one, keeping arrival order on ties.
pub(crate) fn insert_sorted(timeline: &mut Vec<Message>, message: Message) {
    let at = timeline.partition_point(|existing| existing.timestamp <= message.timestamp);
    timeline.insert(at, message);
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
