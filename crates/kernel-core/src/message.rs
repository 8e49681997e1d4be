//! Conversation Messages
//!
//! Message format shared by the conversation loop and prompt builder, plus the
//! fixed-capacity history each session keeps.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

/// Who authored a history entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Kernel-authored instructions and tool catalogue
    System,
    /// Caller text for a turn
    User,
    /// Provider reply or tool outcome
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of a bounded history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Stamp `content` with `role` and the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Shorthand for [`Role::System`]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Shorthand for [`Role::User`]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Shorthand for [`Role::Assistant`]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Fixed-capacity message log holding the most recent `capacity` messages.
///
/// Appending past capacity evicts the oldest messages first.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "StoredHistory")]
pub struct BoundedHistory {
    messages: VecDeque<Message>,
    capacity: usize,
}

/// Wire form of a history before its capacity is checked
#[derive(Deserialize)]
struct StoredHistory {
    messages: Vec<Message>,
    capacity: usize,
}

impl TryFrom<StoredHistory> for BoundedHistory {
    type Error = KernelError;

    /// Keeps only the newest `capacity` messages of an overfull window
    fn try_from(stored: StoredHistory) -> Result<Self> {
        let mut history = Self::new(stored.capacity)?;
        let skip = stored.messages.len().saturating_sub(history.capacity);
        history.messages.extend(stored.messages.into_iter().skip(skip));
        Ok(history)
    }
}

impl BoundedHistory {
    /// Create an empty history; `capacity` must be at least 1
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(KernelError::InvalidInput(
                "history capacity must be at least 1".into(),
            ));
        }

        Ok(Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Append a message, evicting the oldest if full
    pub fn push(&mut self, message: Message) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Oldest-first iterator
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Copy of the current window, oldest first
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&Message> {
        self.messages.back()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Entries currently held
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
