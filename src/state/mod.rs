pub mod directory;
pub mod presence;
pub mod receipts;
pub mod search;
pub mod stream;
pub mod timer;
pub mod typing;

pub use directory::ConversationDirectory;
pub use presence::PresenceTracker;
pub use receipts::{ReadReceiptCoordinator, SharedVisibility, VisibilitySignal};
pub use search::UserSearch;
pub use stream::{Generation, LoadState, LoadTicket, MessageStream};
pub use typing::TypingCoordinator;
