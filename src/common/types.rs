use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identity issued by the auth provider (`clerkId` on the wire).
    UserId
);
string_id!(ConversationId);
string_id!(MessageId);

/// A participant as returned by the backend. Refreshed wholesale on re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "clerkId", alias = "id")]
    pub id: UserId,
    #[serde(rename = "username", alias = "displayName")]
    pub display_name: String,
    #[serde(
        rename = "imageUrl",
        alias = "avatarRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_ref: Option<String>,
}

impl UserRef {
    pub fn new(id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            avatar_ref: None,
        }
    }
}

/// One chat message. `created_at` is not guaranteed to be monotonic in arrival
/// order; display order always comes from [`Message::order_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: MessageId,
    #[serde(rename = "senderId")]
    pub sender: UserRef,
    pub text: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    /// Set by the backend on pushed messages; snapshots may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

impl Message {
    /// Ascending display order: creation time, ties broken by id.
    pub fn order_key(&self) -> (DateTime<Utc>, &MessageId) {
        (self.created_at, &self.id)
    }

    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender.id == user
    }
}

/// A two-party conversation. `messages` is the recency digest shown in the
/// directory (newest first), not the full log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(rename = "_id", alias = "id")]
    pub id: ConversationId,
    pub participants: Vec<UserRef>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// The participant that is not `me`.
    pub fn other_participant(&self, me: &UserId) -> Option<&UserRef> {
        self.participants.iter().find(|p| &p.id != me)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| &p.id == user)
    }
}
