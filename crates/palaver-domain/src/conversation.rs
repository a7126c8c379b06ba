//! Conversation module - the unit of work for the processing engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    /// The customer
    User,
    /// The automated assistant
    Bot,
    /// A human operator
    Operator,
}

impl SenderRole {
    /// Stable string form used in digests, records, and storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::User => "user",
            SenderRole::Bot => "bot",
            SenderRole::Operator => "operator",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s {
            "user" => Some(SenderRole::User),
            "bot" => Some(SenderRole::Bot),
            "operator" => Some(SenderRole::Operator),
            _ => None,
        }
    }
}

impl fmt::Display for SenderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message within a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// When the message was sent
    pub timestamp: DateTime<Utc>,

    /// Sender role
    pub sender: SenderRole,

    /// Message body
    pub text: String,

    /// Alias of the human operator, when one sent this message
    pub operator_alias: Option<String>,
}

impl Message {
    /// Create a message with no operator alias
    pub fn new(timestamp: DateTime<Utc>, sender: SenderRole, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            sender,
            text: text.into(),
            operator_alias: None,
        }
    }
}

/// An immutable conversation: ordered messages under one identifier
///
/// Ingestion (an external collaborator) produces conversations with a
/// normalized identifier and non-decreasing message timestamps. The engine
/// never mutates a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Normalized identifier (e.g. a phone number)
    pub identifier: String,

    /// Messages in chronological order
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create a conversation from pre-ordered messages
    pub fn new(identifier: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            identifier: identifier.into(),
            messages,
        }
    }

    /// Whether message timestamps are non-decreasing
    pub fn is_ordered(&self) -> bool {
        self.messages
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp)
    }

    /// The most recent message, if any
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The most recent message from the given role, if any
    pub fn last_from(&self, role: SenderRole) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.sender == role)
    }

    /// Whether the user has sent at least one message
    pub fn has_user_messages(&self) -> bool {
        self.messages.iter().any(|m| m.sender == SenderRole::User)
    }

    /// Whether any message came from a human operator
    ///
    /// A message counts if its role is `Operator` or it carries an
    /// operator alias.
    pub fn has_operator_messages(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.sender == SenderRole::Operator || m.operator_alias.is_some())
    }

    /// Render the transcript as plain text for prompting
    ///
    /// One line per message: `[RFC3339 timestamp] role: text`.
    pub fn render_transcript(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            out.push_str(&format!(
                "[{}] {}: {}\n",
                message.timestamp.to_rfc3339(),
                message.sender,
                message.text
            ));
        }
        out
    }
}
