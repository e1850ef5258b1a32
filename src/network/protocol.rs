//! Event-channel wire contract. Each event travels as
//! `{"event": <name>, "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::common::{ConversationId, Message, UserId};

/// Events this client emits on the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundEvent {
    /// Announce the identity so presence includes this client.
    #[serde(rename = "addNewUser")]
    AddNewUser(UserId),
    /// Subscribe to a conversation's room.
    #[serde(rename = "joinConversation")]
    JoinConversation(ConversationId),
    #[serde(rename = "sendMessage", rename_all = "camelCase")]
    SendMessage {
        conversation_id: ConversationId,
        sender_id: UserId,
        receiver_id: UserId,
        text: String,
    },
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        conversation_id: ConversationId,
        is_typing: bool,
    },
    #[serde(rename = "markAsRead", rename_all = "camelCase")]
    MarkAsRead {
        conversation_id: ConversationId,
        reader_id: UserId,
    },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::AddNewUser(_) => "addNewUser",
            OutboundEvent::JoinConversation(_) => "joinConversation",
            OutboundEvent::SendMessage { .. } => "sendMessage",
            OutboundEvent::Typing { .. } => "typing",
            OutboundEvent::MarkAsRead { .. } => "markAsRead",
        }
    }
}

/// Events pushed to this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundEvent {
    /// Full replacement of the online set.
    #[serde(rename = "getOnlineUsers")]
    OnlineUsers(Vec<UserId>),
    #[serde(rename = "getMessage")]
    NewMessage(Message),
    #[serde(rename = "userTyping", rename_all = "camelCase")]
    UserTyping {
        is_typing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<ConversationId>,
    },
    #[serde(rename = "messagesRead", rename_all = "camelCase")]
    MessagesRead { conversation_id: ConversationId },
}

impl InboundEvent {
    /// Room-scoped events only make sense while a conversation is open.
    pub fn is_room_scoped(&self) -> bool {
        !matches!(self, InboundEvent::OnlineUsers(_))
    }
}
