//! Chat, Message, and Feedback domain types.
//!
//! These are the core value objects that flow through the system:
//! User submits a message → Orchestrator persists it → Researcher generates
//! a response as a sequence of parts → Codec writes them back to storage.

use crate::part::Part;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn from(s: &str) -> Self {
                Self(s.to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Unique identifier for a chat (conversation).
    ChatId
}
string_id! {
    /// Unique identifier for a message.
    MessageId
}
string_id! {
    /// Identifier of an acting user, asserted by the identity provider.
    UserId
}

/// Who can read a chat.
///
/// Private chats are readable and writable only by their owner.
/// Public chats are readable by anyone but still writable only by the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Public => "public",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Self::Private),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

/// The role of a message sender in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI researcher
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A chat — the root of a conversation.
///
/// Created on the first user message. Only its title and visibility are
/// mutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub user_id: UserId,
    pub visibility: Visibility,
}

impl Chat {
    /// Create a new private chat owned by `user_id`.
    pub fn new(user_id: UserId, title: impl Into<String>) -> Self {
        Self {
            id: ChatId::new(),
            created_at: Utc::now(),
            title: title.into(),
            user_id,
            visibility: Visibility::Private,
        }
    }
}

/// A single message in a chat, owning an ordered sequence of parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: MessageId,

    /// Owning chat
    pub chat_id: ChatId,

    /// Who sent this message
    pub role: Role,

    /// Ordered content parts
    pub parts: Vec<Part>,

    /// Free-form metadata (model info, usage, client hints)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Create a new user message with a single text part.
    pub fn user(chat_id: ChatId, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::new(),
            chat_id,
            role: Role::User,
            parts: vec![Part::Text { text: text.into() }],
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new assistant message from generated parts.
    pub fn assistant(chat_id: ChatId, parts: Vec<Part>) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::new(),
            chat_id,
            role: Role::Assistant,
            parts,
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Concatenated text content of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// User sentiment on the product as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// Append-only product feedback, independent of any chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub user_id: Option<UserId>,
    pub sentiment: Sentiment,
    pub message: String,
    pub page_url: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    pub fn new(
        user_id: Option<UserId>,
        sentiment: Sentiment,
        message: impl Into<String>,
        page_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            sentiment,
            message: message.into(),
            page_url: page_url.into(),
            user_agent: user_agent.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let chat_id = ChatId::new();
        let msg = Message::user(chat_id.clone(), "What is Rust?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.chat_id, chat_id);
        assert_eq!(msg.text(), "What is Rust?");
    }

    #[test]
    fn assistant_message_joins_text_parts() {
        let msg = Message::assistant(
            ChatId::new(),
            vec![
                Part::Text {
                    text: "First.".into(),
                },
                Part::StepStart,
                Part::Text {
                    text: "Second.".into(),
                },
            ],
        );
        assert_eq!(msg.text(), "First.\nSecond.");
    }

    #[test]
    fn chat_defaults_to_private() {
        let chat = Chat::new(UserId::from("u1"), "Rust questions");
        assert_eq!(chat.visibility, Visibility::Private);
        assert_eq!(chat.user_id.as_str(), "u1");
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user(ChatId::new(), "Test message");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.text(), "Test message");
        assert_eq!(deserialized.role, Role::User);
    }

    #[test]
    fn role_and_visibility_parse() {
        assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
        assert_eq!(Visibility::parse("public"), Some(Visibility::Public));
        assert_eq!(Visibility::parse("hidden"), None);
    }
}
