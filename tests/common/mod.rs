//! Shared fakes for driving a [`SyncEngine`] without a backend.
//!
//! The harness owns the engine's input queue, so a test can either settle
//! everything in arrival order or pull completions one by one and feed them
//! back in any order it likes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;
use wavenet_chat::common::{ClientEvent, Conversation, ConversationId, Message, UserId, UserRef};
use wavenet_chat::network::{
    ChannelConnector, ChannelEvent, ChannelSink, ChatApi, EventChannel, InboundEvent, OutboundEvent,
};
use wavenet_chat::state::SharedVisibility;
use wavenet_chat::{EngineInput, Result, SyncEngine, SyncError, SyncSettings};

/// How long `settle` waits for one more input before declaring quiescence.
pub const SETTLE_WINDOW: Duration = Duration::from_millis(20);

/// Default timeout for waiting on a single input.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(1);

pub fn user(id: &str) -> UserRef {
    UserRef::new(id, id.to_uppercase())
}

pub fn message(id: &str, from: &str, secs: i64) -> Message {
    Message {
        id: id.into(),
        sender: user(from),
        text: format!("text of {id}"),
        is_read: false,
        created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        conversation_id: None,
    }
}

pub fn conversation(id: &str, a: &str, b: &str) -> Conversation {
    Conversation {
        id: id.into(),
        participants: vec![user(a), user(b)],
        messages: Vec::new(),
    }
}

#[derive(Default)]
pub struct FakeApi {
    pub conversations: Mutex<Vec<Conversation>>,
    pub messages: Mutex<HashMap<ConversationId, Vec<Message>>>,
    pub users: Mutex<Vec<UserRef>>,
    pub fail_messages: AtomicBool,
    pub message_fetches: AtomicUsize,
    pub find_or_create_calls: AtomicUsize,
}

impl FakeApi {
    pub fn set_messages(&self, conversation: &str, messages: Vec<Message>) {
        self.messages
            .lock()
            .unwrap()
            .insert(conversation.into(), messages);
    }
}

impl ChatApi for FakeApi {
    async fn conversations(&self, user: &UserId) -> Result<Vec<Conversation>> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.has_participant(user))
            .cloned()
            .collect())
    }

    async fn find_or_create(&self, sender: &UserId, receiver: &UserId) -> Result<Conversation> {
        self.find_or_create_calls.fetch_add(1, Ordering::SeqCst);
        let mut conversations = self.conversations.lock().unwrap();
        if let Some(existing) = conversations
            .iter()
            .find(|c| c.has_participant(sender) && c.has_participant(receiver))
        {
            return Ok(existing.clone());
        }
        let created = conversation(
            &format!("conv-{sender}-{receiver}"),
            sender.as_str(),
            receiver.as_str(),
        );
        conversations.push(created.clone());
        Ok(created)
    }

    async fn messages(&self, conversation: &ConversationId) -> Result<Vec<Message>> {
        self.message_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(SyncError::Channel("backend unreachable".into()));
        }
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(conversation)
            .cloned()
            .unwrap_or_default())
    }

    async fn users(&self, excluding: &UserId) -> Result<Vec<UserRef>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| &u.id != excluding)
            .cloned()
            .collect())
    }
}

/// Everything that went over the fake event channel, plus the sinks handed
/// out so tests can push events from the "server".
#[derive(Default)]
pub struct Wire {
    pub emitted: Mutex<Vec<OutboundEvent>>,
    pub sinks: Mutex<Vec<ChannelSink>>,
    pub closed: AtomicUsize,
    pub offline: AtomicBool,
}

impl Wire {
    pub fn take_emitted(&self) -> Vec<OutboundEvent> {
        std::mem::take(&mut *self.emitted.lock().unwrap())
    }

    /// Sink of the `n`th channel opened.
    pub fn sink(&self, n: usize) -> ChannelSink {
        self.sinks.lock().unwrap()[n].clone()
    }

    pub fn latest_sink(&self) -> ChannelSink {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no channel was opened")
    }
}

struct RecordingChannel(Arc<Wire>);

impl EventChannel for RecordingChannel {
    fn emit(&self, event: OutboundEvent) -> Result<()> {
        if self.0.offline.load(Ordering::SeqCst) {
            return Err(SyncError::Channel("offline".into()));
        }
        self.0.emitted.lock().unwrap().push(event);
        Ok(())
    }

    fn close(&self) {
        self.0.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct RecordingConnector(pub Arc<Wire>);

impl ChannelConnector for RecordingConnector {
    fn connect(&self, _identity: &UserId, sink: ChannelSink) -> Result<Box<dyn EventChannel>> {
        self.0.sinks.lock().unwrap().push(sink);
        Ok(Box::new(RecordingChannel(Arc::clone(&self.0))))
    }
}

pub struct Harness {
    pub engine: SyncEngine<FakeApi>,
    pub api: Arc<FakeApi>,
    pub wire: Arc<Wire>,
    pub visibility: SharedVisibility,
    inputs: mpsc::UnboundedReceiver<EngineInput>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
}

impl Harness {
    pub fn new(api: FakeApi) -> Self {
        Self::with_settings(api, SyncSettings::default())
    }

    pub fn with_settings(api: FakeApi, settings: SyncSettings) -> Self {
        let api = Arc::new(api);
        let wire = Arc::new(Wire::default());
        let visibility = SharedVisibility::new(true);
        let (input_tx, inputs) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();
        let engine = SyncEngine::new(
            Arc::clone(&api),
            Arc::new(RecordingConnector(Arc::clone(&wire))),
            Box::new(visibility.clone()),
            settings,
            input_tx,
            event_tx,
        );
        Self {
            engine,
            api,
            wire,
            visibility,
            inputs,
            events,
        }
    }

    /// Log in and apply the directory snapshot.
    pub async fn login(&mut self, identity: &str) {
        self.engine.login(identity.into());
        self.settle().await;
    }

    pub async fn next_input(&mut self) -> EngineInput {
        tokio::time::timeout(TEST_TIMEOUT, self.inputs.recv())
            .await
            .expect("timed out waiting for an engine input")
            .expect("input queue closed")
    }

    /// Handle inputs until none arrives within the settle window.
    pub async fn settle(&mut self) {
        while let Ok(Some(input)) = tokio::time::timeout(SETTLE_WINDOW, self.inputs.recv()).await {
            self.engine.handle(input);
        }
    }

    /// Push an event from the live channel and let the engine consume it.
    pub async fn push(&mut self, event: InboundEvent) {
        assert!(self.wire.latest_sink().deliver(ChannelEvent::Inbound(event)));
        self.settle().await;
    }

    pub async fn channel_event(&mut self, event: ChannelEvent) {
        assert!(self.wire.latest_sink().deliver(event));
        self.settle().await;
    }

    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }

    pub fn message_ids(&self) -> Vec<String> {
        self.engine
            .stream()
            .map(|s| s.messages().iter().map(|m| m.id.to_string()).collect())
            .unwrap_or_default()
    }
}
