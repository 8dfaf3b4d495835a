use std::collections::HashMap;

use shared::domain::{ConversationKey, Profile};

/// Process-lifetime profile cache. Entries are replaced by newer responses, never evicted.
#[derive(Debug, Default)]
pub struct ProfileCache {
    profiles: HashMap<ConversationKey, Profile>,
}

impl ProfileCache {
    pub fn insert(&mut self, profile: Profile) {
        self.profiles
            .insert(profile.conversation_key.clone(), profile);
    }

    pub fn get(&self, key: &ConversationKey) -> Option<&Profile> {
        self.profiles.get(key)
    }

    pub fn display_name(&self, key: &ConversationKey) -> Option<&str> {
        self.get(key).and_then(Profile::display_name)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
