//! Client-side realtime sync for a two-party chat: conversation directory,
//! ordered message logs, presence, typing indicators and read receipts, kept
//! consistent across snapshot fetches and pushed events.

pub mod common;
pub mod config;
pub mod engine;
pub mod error;
pub mod network;
pub mod state;

pub use engine::{EngineInput, SyncEngine, SyncSettings};
pub use error::{Result, SyncError};
