pub mod commands;
pub mod events;
pub mod types;

pub use commands::ClientCommand;
pub use events::{ChannelStatus, ClientEvent, LoadTarget};
pub use types::{Conversation, ConversationId, Message, MessageId, UserId, UserRef};
