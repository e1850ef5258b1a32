use super::types::{ConversationId, UserId};

/// Actions the UI sends down to the sync engine.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Open the channel for `identity` and fetch its conversation list.
    Login(UserId),
    /// Tear the session down; all per-identity state is discarded.
    Logout,
    /// Re-fetch the conversation list snapshot.
    RefreshDirectory,
    /// Open a conversation already present in the directory.
    SelectConversation(ConversationId),
    /// Find or create the conversation with `other` and open it.
    OpenWith(UserId),
    /// The message draft changed (one keystroke).
    TextInput,
    SendMessage(String),
    /// Whether the chat surface is in the foreground.
    SetVisible(bool),
    /// Update the user search query; an empty query clears results.
    Search(String),
}
