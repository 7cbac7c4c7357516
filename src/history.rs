//! Bounded per-user conversation history
//!
//! A pure FIFO append log of role-tagged turns, capped at two turns per
//! retained exchange. The bound exists to cap outbound prompt context, not
//! for correctness; entries never expire on their own.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The human side of the exchange
    User,
    /// The model side of the exchange
    Assistant,
}

impl Role {
    /// Wire-format role name used by the chat-completion APIs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Speaker of this turn
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Turn {
    /// Build a user turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant turn
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Snapshot of store occupancy, for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Users with retained history
    pub active_users: usize,
    /// Turns retained across all users
    pub total_turns: usize,
}

/// Per-user bounded conversation log
///
/// Holds at most `2 × max_exchanges` turns per user (one user turn plus one
/// assistant turn per exchange), dropping the oldest first.
#[derive(Debug)]
pub struct ConversationStore {
    turns: Mutex<HashMap<String, VecDeque<Turn>>>,
    max_exchanges: usize,
}

impl ConversationStore {
    /// Create a store retaining up to `max_exchanges` exchanges per user.
    #[must_use]
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            turns: Mutex::new(HashMap::new()),
            max_exchanges,
        }
    }

    /// The user's retained turns, oldest first.
    pub fn history(&self, user_id: &str) -> Vec<Turn> {
        let map = self.lock();
        map.get(user_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append one exchange (user turn then assistant turn), trimming from
    /// the front once the bound is exceeded.
    pub fn append_exchange(&self, user_id: &str, user_text: &str, assistant_text: &str) {
        let mut map = self.lock();
        let turns = map.entry(user_id.to_string()).or_default();
        turns.push_back(Turn::user(user_text));
        turns.push_back(Turn::assistant(assistant_text));

        let cap = self.max_exchanges * 2;
        while turns.len() > cap {
            turns.pop_front();
        }
    }

    /// Delete the user's entry entirely.
    ///
    /// Returns `true` if there was history to remove.
    pub fn clear(&self, user_id: &str) -> bool {
        self.lock().remove(user_id).is_some()
    }

    /// Diagnostic snapshot of current occupancy.
    pub fn stats(&self) -> StoreStats {
        let map = self.lock();
        StoreStats {
            active_users: map.len(),
            total_turns: map.values().map(VecDeque::len).sum(),
        }
    }

    /// Configured retained-exchange cap.
    #[must_use]
    pub fn max_exchanges(&self) -> usize {
        self.max_exchanges
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Turn>>> {
        self.turns
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
