//! Conversation history sent to the generative model.
//!
//! A [`ConversationHistory`] is an immutable value: every append returns a new
//! history, so the history frozen into one story chunk can never be changed by
//! a sibling branch that continues from the same parent.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Ordered, append-only sequence of role-tagged messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory(Vec<ChatMessage>);

impl ConversationHistory {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self(messages)
    }

    /// Returns a new history with `message` appended.
    pub fn with(&self, message: ChatMessage) -> Self {
        let mut messages = Vec::with_capacity(self.0.len() + 1);
        messages.extend(self.0.iter().cloned());
        messages.push(message);
        Self(messages)
    }

    pub fn with_system(&self, content: impl Into<String>) -> Self {
        self.with(ChatMessage::system(content))
    }

    pub fn with_user(&self, content: impl Into<String>) -> Self {
        self.with(ChatMessage::user(content))
    }

    pub fn with_assistant(&self, content: impl Into<String>) -> Self {
        self.with(ChatMessage::assistant(content))
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.0.iter()
    }

    /// Checks the turn-taking contract of a conversation about to be sent:
    /// `system?, (user, assistant)*, user`.
    ///
    /// A violation is a programming error; callers must not try to repair it.
    pub fn validate_turn_order(&self) -> Result<(), DomainError> {
        let mut messages = self.0.iter().enumerate().peekable();

        if let Some((_, first)) = messages.peek() {
            if first.role == MessageRole::System {
                messages.next();
            }
        }

        let mut expected = MessageRole::User;
        let mut last_role = None;
        for (idx, message) in messages {
            if message.role != expected {
                return Err(DomainError::structural(format!(
                    "history is not in the correct conversation format: expected {} at index {}, found {}",
                    expected, idx, message.role
                )));
            }
            last_role = Some(message.role);
            expected = match expected {
                MessageRole::User => MessageRole::Assistant,
                _ => MessageRole::User,
            };
        }

        match last_role {
            Some(MessageRole::User) => Ok(()),
            Some(role) => Err(DomainError::structural(format!(
                "history is not in the correct conversation format: last message is {}",
                role
            ))),
            None => Err(DomainError::structural(
                "history has no user turn to send",
            )),
        }
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
