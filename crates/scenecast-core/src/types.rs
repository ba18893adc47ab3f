//! Core types for the pipeline
//!
//! - Conversation turns and history
//! - Requests

use chrono::{DateTime, Utc};
use scenecast_kernel::{Quality, RequestId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Most recent turns handed to the synthesizer as context
pub const MAX_CONTEXT_TURNS: usize = 10;

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking for animations
    User,
    /// The system's replies
    Assistant,
}

impl Role {
    /// Chat API role name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Author
    pub role: Role,
    /// Message text
    pub content: String,
    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Turn stamped now
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// User turn stamped now
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Assistant turn stamped now
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered, append-only conversation history.
///
/// Clones share the same turns; appending to one clone copies on write, so a
/// request holding a clone keeps seeing the history as it was when the
/// request was built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Arc<Vec<Turn>>,
}

impl ConversationHistory {
    /// Empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn push(&mut self, turn: Turn) {
        Arc::make_mut(&mut self.turns).push(turn);
    }

    /// All turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent `n` turns, oldest first
    #[must_use]
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether there are no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl FromIterator<Turn> for ConversationHistory {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: Arc::new(iter.into_iter().collect()),
        }
    }
}

/// One animation request
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    description: String,
    history: ConversationHistory,
    quality: Quality,
}

impl Request {
    /// Request with empty history at medium quality
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            description: description.into(),
            history: ConversationHistory::new(),
            quality: Quality::default(),
        }
    }

    /// With conversation context
    #[must_use]
    pub fn with_history(mut self, history: ConversationHistory) -> Self {
        self.history = history;
        self
    }

    /// With quality tier
    #[must_use]
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Request identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// What to animate
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Conversation context
    #[inline]
    #[must_use]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Quality tier
    #[inline]
    #[must_use]
    pub fn quality(&self) -> Quality {
        self.quality
    }
}
