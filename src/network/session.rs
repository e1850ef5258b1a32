use std::sync::Arc;

use tokio::sync::mpsc;

use super::channel::{ChannelConnector, ChannelSink, EventChannel, SessionEpoch};
use super::protocol::OutboundEvent;
use crate::common::{ConversationId, UserId};
use crate::engine::EngineInput;
use crate::error::{Result, SyncError};

struct ActiveChannel {
    identity: UserId,
    channel: Box<dyn EventChannel>,
    announced: bool,
    connected: bool,
    connected_before: bool,
}

/// Owns the event channel of the logged-in identity. At most one channel is
/// live; opening for a new identity tears the previous one down first.
pub struct ConnectionSession {
    connector: Arc<dyn ChannelConnector>,
    epoch: SessionEpoch,
    active: Option<ActiveChannel>,
    room: Option<ConversationId>,
    room_joined: bool,
}

impl ConnectionSession {
    pub fn new(connector: Arc<dyn ChannelConnector>) -> Self {
        Self {
            connector,
            epoch: SessionEpoch::default(),
            active: None,
            room: None,
            room_joined: false,
        }
    }

    /// Open a channel for `identity` and announce it. When the transport
    /// cannot be set up the session stays degraded: no presence or pushes,
    /// but the returned epoch is still valid for tagging snapshot fetches.
    pub fn open(&mut self, identity: UserId, queue: &mpsc::UnboundedSender<EngineInput>) -> SessionEpoch {
        self.close();
        self.epoch = SessionEpoch(self.epoch.0 + 1);

        let sink = ChannelSink::new(self.epoch, queue.clone());
        match self.connector.connect(&identity, sink) {
            Ok(channel) => {
                let announced = channel
                    .emit(OutboundEvent::AddNewUser(identity.clone()))
                    .is_ok();
                log::info!("Opened event channel for {identity} (epoch {})", self.epoch.0);
                self.active = Some(ActiveChannel {
                    identity,
                    channel,
                    announced,
                    connected: announced,
                    connected_before: false,
                });
            }
            Err(err) => {
                log::warn!("Event channel unavailable for {identity}; continuing without live updates: {err}");
            }
        }
        self.epoch
    }

    /// Tear the channel down. Later events from it are rejected by epoch.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            log::info!("Closing event channel for {}", active.identity);
            active.channel.close();
        }
        self.leave_room();
    }

    pub fn epoch(&self) -> SessionEpoch {
        self.epoch
    }

    /// Whether events stamped with `epoch` belong to the live channel.
    pub fn accepts(&self, epoch: SessionEpoch) -> bool {
        self.active.is_some() && epoch == self.epoch
    }

    pub fn identity(&self) -> Option<&UserId> {
        self.active.as_ref().map(|a| &a.identity)
    }

    pub fn is_connected(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.connected)
    }

    pub fn room(&self) -> Option<&ConversationId> {
        self.room.as_ref()
    }

    pub fn emit(&self, event: OutboundEvent) -> Result<()> {
        match &self.active {
            Some(active) => active.channel.emit(event),
            None => Err(SyncError::Channel("no channel is open".to_string())),
        }
    }

    /// Subscribe to a conversation's room and remember it for reconnects.
    pub fn join_room(&mut self, conversation_id: ConversationId) -> Result<()> {
        self.room = Some(conversation_id.clone());
        let joined = self.emit(OutboundEvent::JoinConversation(conversation_id));
        self.room_joined = joined.is_ok();
        joined
    }

    /// There is no leave event on the wire; this only stops re-joins.
    pub fn leave_room(&mut self) {
        self.room = None;
        self.room_joined = false;
    }

    /// The transport reports a (re)connection. Re-announces the identity and
    /// re-joins the open room when needed. Returns `Some(true)` for a
    /// reconnect, after which the caller must reload the open conversation.
    pub fn on_connected(&mut self, epoch: SessionEpoch) -> Option<bool> {
        if !self.accepts(epoch) {
            return None;
        }
        let room = self.room.clone();
        let room_joined = self.room_joined;
        let active = self.active.as_mut()?;
        let reconnect = active.connected_before;
        active.connected = true;
        active.connected_before = true;

        if reconnect || !active.announced {
            match active
                .channel
                .emit(OutboundEvent::AddNewUser(active.identity.clone()))
            {
                Ok(()) => active.announced = true,
                Err(err) => log::warn!("Failed to announce {}: {err}", active.identity),
            }
        }
        let mut joined = room_joined;
        if let Some(room) = room.filter(|_| reconnect || !room_joined) {
            log::info!("Joining conversation {room} on the new connection");
            match active.channel.emit(OutboundEvent::JoinConversation(room)) {
                Ok(()) => joined = true,
                Err(err) => log::warn!("Failed to join room: {err}"),
            }
        }
        self.room_joined = joined;
        Some(reconnect)
    }

    pub fn on_disconnected(&mut self, epoch: SessionEpoch) -> bool {
        if !self.accepts(epoch) {
            return false;
        }
        match self.active.as_mut() {
            Some(active) => {
                log::warn!("Event channel for {} disconnected", active.identity);
                active.connected = false;
                self.room_joined = false;
                true
            }
            None => false,
        }
    }
}
