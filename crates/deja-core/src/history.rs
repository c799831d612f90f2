//! Conversation message types and the windowable chat history buffer

use crate::error::{DejaError, DejaResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message in the conversation
///
/// `Empty` is the placeholder role used to left-pad windows that are longer
/// than the history (see [`ChatHistory::get_messages`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message (human input)
    User,
    /// Assistant message (model response)
    Assistant,
    /// System message (instructions); also accepts the "developer" wire name
    #[serde(alias = "developer")]
    System,
    /// Placeholder role for window padding
    #[serde(rename = "")]
    Empty,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Empty => Ok(()),
        }
    }
}

/// A single message in the conversation
///
/// Messages are immutable value objects once constructed; equality is by
/// value, which is what the deduplication stage relies on. Tool calls are
/// carried as opaque ordered records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// Optional tool calls (for assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<serde_json::Value>>,
}

impl Message {
    /// Create a new user message
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Create a new assistant message
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Create a new system message
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
        }
    }

    /// Create an empty placeholder message used for window padding
    pub fn empty() -> Self {
        Self {
            role: Role::Empty,
            content: String::new(),
            tool_calls: None,
        }
    }

    /// Attach tool calls to the message
    pub fn with_tool_calls(mut self, tool_calls: Vec<serde_json::Value>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Replace the content, keeping role and tool calls
    pub fn with_content<S: Into<String>>(mut self, content: S) -> Self {
        self.content = content.into();
        self
    }

    /// Check if this message has tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .is_some_and(|calls| !calls.is_empty())
    }

    /// Check if this is an empty placeholder
    pub fn is_placeholder(&self) -> bool {
        self.role == Role::Empty && self.content.is_empty()
    }
}

impl fmt::Display for Message {
    /// Canonical text form used to build cache keys: `"{role}: {content}"`,
    /// the empty string when the content is empty, with tool calls appended
    /// when present.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.content.is_empty() {
            return Ok(());
        }
        match &self.tool_calls {
            Some(calls) if !calls.is_empty() => {
                let rendered = serde_json::to_string(calls).map_err(|_| fmt::Error)?;
                write!(f, "{}: {} (Tool calls: {})", self.role, self.content, rendered)
            }
            _ => write!(f, "{}: {}", self.role, self.content),
        }
    }
}

/// An append-only ordered conversation buffer with windowing
///
/// Owned by exactly one [`CacheEngine`](crate::engine::CacheEngine) instance;
/// not designed for concurrent mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Append an assistant message
    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Append an arbitrary message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the entire message sequence
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Borrow the message sequence
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Derive a fixed-length window over the most recent messages.
    ///
    /// - `length == 0` returns the entire history unchanged.
    /// - `length <= len` returns the last `length` messages.
    /// - `length > len` left-pads with empty placeholder messages so the
    ///   result has exactly `length` elements, preserving order.
    ///
    /// Pure: re-derivable at any time from the history alone.
    pub fn get_messages(&self, length: usize) -> Vec<Message> {
        if length == 0 {
            return self.messages.clone();
        }
        if length > self.messages.len() {
            let mut window = vec![Message::empty(); length - self.messages.len()];
            window.extend(self.messages.iter().cloned());
            return window;
        }
        self.messages[self.messages.len() - length..].to_vec()
    }

    /// Content strings of the window at `length`, the shape backends receive
    /// as the lookup/write key. Placeholder slots contribute empty strings.
    pub fn window_texts(&self, length: usize) -> Vec<String> {
        self.get_messages(length)
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }

    /// Remove the message at `index`, returning it.
    pub fn remove_message(&mut self, index: usize) -> DejaResult<Message> {
        if index >= self.messages.len() {
            return Err(DejaError::out_of_bounds(index, self.messages.len()));
        }
        Ok(self.messages.remove(index))
    }

    /// Replace the message at `index`. Used by the engine when re-applying
    /// the write-side pipeline over the full history.
    pub(crate) fn replace_message(&mut self, index: usize, message: Message) {
        self.messages[index] = message;
    }

    /// Drop all messages
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Number of messages in the history
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check whether the history holds no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterate over the messages in conversation order
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}

impl std::ops::Index<usize> for ChatHistory {
    type Output = Message;

    fn index(&self, index: usize) -> &Message {
        &self.messages[index]
    }
}

impl<'a> IntoIterator for &'a ChatHistory {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

impl From<Vec<Message>> for ChatHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl fmt::Display for ChatHistory {
    /// Full transcript: newline-joined canonical message forms.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", message)?;
        }
        Ok(())
    }
}
