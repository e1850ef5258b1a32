use super::types::{Conversation, ConversationId, Message, UserId, UserRef};

/// Which snapshot fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget {
    Directory,
    Messages,
    Conversation,
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connected,
    Disconnected,
}

/// State changes the sync engine reports up to the UI.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The conversation list, in display order.
    Directory(Vec<Conversation>),
    ConversationOpened(Conversation),
    /// The open conversation's log, in display order.
    Messages {
        conversation_id: ConversationId,
        messages: Vec<Message>,
        /// The current user's latest message has been read by the other side.
        seen: bool,
    },
    Presence(Vec<UserId>),
    RemoteTyping(bool),
    SearchResults(Vec<UserRef>),
    /// Non-fatal: prior state is left intact and nothing is retried.
    LoadFailed { target: LoadTarget, reason: String },
    ChannelState(ChannelStatus),
}
