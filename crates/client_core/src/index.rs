//! Sidebar view derived from the message store.

use shared::domain::{ConversationKey, Message};

use crate::{profiles::ProfileCache, store::MessageStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub key: ConversationKey,
    /// Ascending by timestamp.
    pub messages: Vec<Message>,
    pub last_message: Message,
    /// Never incremented; carried for consumers that render a badge.
    pub unread_count: u32,
}

/// Conversations sorted by most recent activity first.
#[derive(Debug, Default, Clone)]
pub struct ConversationIndex {
    conversations: Vec<Conversation>,
    revision: u64,
}

impl ConversationIndex {
    pub fn build(store: &MessageStore) -> Self {
        let mut conversations: Vec<Conversation> = store
            .conversations()
            .filter_map(|(key, messages)| {
                let last_message = messages.last()?.clone();
                Some(Conversation {
                    key: key.clone(),
                    messages: messages.to_vec(),
                    last_message,
                    unread_count: 0,
                })
            })
            .collect();

        conversations.sort_by(|a, b| {
            b.last_message
                .timestamp
                .cmp(&a.last_message.timestamp)
                .then_with(|| a.key.cmp(&b.key))
        });

        Self {
            conversations,
            revision: store.revision(),
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn is_current(&self, store: &MessageStore) -> bool {
        self.revision == store.revision()
    }

    /// Case-insensitive match on key, cached display name, or last message text.
    pub fn filter<'a>(&'a self, query: &str, profiles: &ProfileCache) -> Vec<&'a Conversation> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.conversations.iter().collect();
        }
        self.conversations
            .iter()
            .filter(|conversation| {
                conversation.key.as_str().to_lowercase().contains(&needle)
                    || profiles
                        .display_name(&conversation.key)
                        .is_some_and(|name| name.to_lowercase().contains(&needle))
                    || conversation
                        .last_message
                        .text
                        .to_lowercase()
                        .contains(&needle)
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/index_tests.rs"]
mod tests;
