use std::collections::VecDeque;

use crate::types::{Message, SHORT_ID_LEN, short_id};

/// Messages kept for short-id resolution.
pub const RECENT_CAPACITY: usize = 100;

/// Bounded window over the active channel's latest messages, oldest first.
///
/// Exists only so `/reply`, `/edit` and `/delete` can accept the six
/// character ids shown next to each message.
#[derive(Debug, Default)]
pub struct RecentMessages {
    messages: VecDeque<Message>,
}

impl RecentMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the window, keeping the last [`RECENT_CAPACITY`] messages.
    pub fn replace(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.clear();
        for message in messages {
            self.push(message);
        }
    }

    /// Appends a message; returns false if its id is already present.
    pub fn push(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|known| known.id == message.id) {
            return false;
        }
        if self.messages.len() == RECENT_CAPACITY {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        true
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Finds a message by full id or by short id, ignoring case.  The newest
    /// match wins.
    pub fn resolve(&self, id: &str) -> Option<&Message> {
        let exact = self.messages.iter().rev().find(|message| message.id == id);
        if exact.is_some() || id.chars().count() != SHORT_ID_LEN {
            return exact;
        }
        self.messages
            .iter()
            .rev()
            .find(|message| short_id(&message.id).eq_ignore_ascii_case(id))
    }
}
