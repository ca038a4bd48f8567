//! Per-user conversation state.
//!
//! One mode per user decides how the next plain-text message is interpreted.
//! The modes are mutually exclusive by construction: the AI relay is a
//! variant of the same enum, so a user cannot simultaneously be
//! mid-onboarding and chatting with the assistant.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// What the bot expects the user's next message to be.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChatMode {
    /// Plain menu navigation; free text is not consumed by any flow.
    #[default]
    Idle,
    /// Onboarding step 1: next message is a university name.
    AwaitingUniversity,
    /// Onboarding step 2: next message is a group name.
    AwaitingGroup,
    /// Next message is "<index> <new deadline text>".
    AwaitingDeadlineEdit,
    /// Next message is a bare deadline index to delete.
    AwaitingDeadlineDelete,
    /// Free text is relayed to the GigaChat assistant.
    AiChat,
}

/// Process-lifetime store of conversation modes, injected into the handlers.
#[derive(Debug, Default)]
pub struct SessionStore {
    modes: Mutex<HashMap<u64, ChatMode>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode for a user; unseen users are `Idle`.
    pub fn get(&self, user_id: u64) -> ChatMode {
        self.modes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&self, user_id: u64, mode: ChatMode) {
        self.modes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, mode);
    }

    /// Reset the user back to `Idle`.
    pub fn clear(&self, user_id: u64) {
        self.modes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_user_is_idle() {
        let store = SessionStore::new();
        assert_eq!(store.get(42), ChatMode::Idle);
    }

    #[test]
    fn set_get_clear_roundtrip() {
        let store = SessionStore::new();
        store.set(42, ChatMode::AwaitingUniversity);
        assert_eq!(store.get(42), ChatMode::AwaitingUniversity);

        store.set(42, ChatMode::AiChat);
        assert_eq!(store.get(42), ChatMode::AiChat);

        store.clear(42);
        assert_eq!(store.get(42), ChatMode::Idle);
    }

    #[test]
    fn users_are_independent() {
        let store = SessionStore::new();
        store.set(1, ChatMode::AiChat);
        assert_eq!(store.get(2), ChatMode::Idle);
    }
}
