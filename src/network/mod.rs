pub mod api;
pub mod channel;
pub mod client;
pub mod protocol;
pub mod router;
pub mod session;
pub mod transport;

pub use api::{ChatApi, HttpApi};
pub use channel::{ChannelConnector, ChannelEvent, ChannelSink, EventChannel, SessionEpoch};
pub use client::SyncClient;
pub use protocol::{InboundEvent, OutboundEvent};
pub use transport::WsConnector;
