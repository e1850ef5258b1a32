use tokio::sync::mpsc;

use super::protocol::{InboundEvent, OutboundEvent};
use crate::common::UserId;
use crate::engine::EngineInput;
use crate::error::Result;

/// Identifies one opened channel (one login). Events carrying an older epoch
/// come from a channel that has already been torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionEpoch(pub u64);

/// What a transport reports about its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The transport (re)established its connection.
    Connected,
    Disconnected,
    Inbound(InboundEvent),
}

/// A live duplex channel for one identity. Emission never blocks; it fails
/// with [`crate::SyncError::Channel`] while the transport is not connected.
pub trait EventChannel: Send + Sync {
    fn emit(&self, event: OutboundEvent) -> Result<()>;
    fn close(&self);
}

/// Opens channels. Implementations deliver everything they receive through
/// the provided [`ChannelSink`], including `Connected` once the transport is
/// up and after every reconnect.
pub trait ChannelConnector: Send + Sync {
    fn connect(&self, identity: &UserId, sink: ChannelSink) -> Result<Box<dyn EventChannel>>;
}

/// Handle through which a transport feeds the engine's input queue. Every
/// delivered event is stamped with the epoch of the channel that produced it.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    epoch: SessionEpoch,
    queue: mpsc::UnboundedSender<EngineInput>,
}

impl ChannelSink {
    pub fn new(epoch: SessionEpoch, queue: mpsc::UnboundedSender<EngineInput>) -> Self {
        Self { epoch, queue }
    }

    pub fn epoch(&self) -> SessionEpoch {
        self.epoch
    }

    /// Returns `false` once the engine is gone and the transport should stop.
    pub fn deliver(&self, event: ChannelEvent) -> bool {
        self.queue
            .send(EngineInput::Channel {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }
}
