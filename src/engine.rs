//! The sync engine: every component of one logged-in session, mutated from a
//! single task one input at a time.
//!
//! Local actions arrive as method calls. Fetch completions, channel events
//! and timer expiries arrive as [`EngineInput`]s through the queue handed to
//! [`SyncEngine::new`]; each carries the generation or epoch it was issued
//! under, and anything stale is dropped on arrival.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::common::{
    ChannelStatus, ClientCommand, ClientEvent, Conversation, ConversationId, LoadTarget, Message,
    UserId, UserRef,
};
use crate::error::{Result, SyncError};
use crate::network::api::ChatApi;
use crate::network::channel::{ChannelConnector, ChannelEvent, SessionEpoch};
use crate::network::protocol::{InboundEvent, OutboundEvent};
use crate::network::router::{Dispatch, EventRouter};
use crate::network::session::ConnectionSession;
use crate::state::directory::ConversationDirectory;
use crate::state::presence::PresenceTracker;
use crate::state::receipts::{ReadReceiptCoordinator, VisibilitySignal};
use crate::state::search::{QueryId, UserSearch};
use crate::state::stream::{Generation, LoadTicket, MessageStream};
use crate::state::timer::TimerToken;
use crate::state::typing::TypingCoordinator;

/// Timing and ordering knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Local typing goes idle after this much silence.
    pub typing_idle: Duration,
    /// Client-side expiry for the remote typing flag; `None` trusts the
    /// sender's terminal event.
    pub remote_typing_expiry: Option<Duration>,
    pub search_debounce: Duration,
    /// Move a conversation to the top of the directory on new activity.
    pub reorder_on_activity: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            typing_idle: Duration::from_secs(2),
            remote_typing_expiry: Some(Duration::from_secs(5)),
            search_debounce: Duration::from_millis(500),
            reorder_on_activity: false,
        }
    }
}

/// Asynchronous completions re-entering the engine.
#[derive(Debug)]
pub enum EngineInput {
    Channel {
        epoch: SessionEpoch,
        event: ChannelEvent,
    },
    DirectoryLoaded {
        epoch: SessionEpoch,
        result: Result<Vec<Conversation>>,
    },
    HistoryLoaded {
        generation: Generation,
        load: LoadTicket,
        result: Result<Vec<Message>>,
    },
    ConversationResolved {
        epoch: SessionEpoch,
        result: Result<Conversation>,
    },
    UsersFetched {
        query: QueryId,
        result: Result<Vec<UserRef>>,
    },
    TypingIdle(TimerToken),
    RemoteTypingExpired(TimerToken),
    SearchDebounced(TimerToken),
}

pub struct SyncEngine<A: ChatApi> {
    api: Arc<A>,
    queue: mpsc::UnboundedSender<EngineInput>,
    events: mpsc::UnboundedSender<ClientEvent>,
    identity: Option<UserId>,
    session: ConnectionSession,
    router: EventRouter,
    presence: PresenceTracker,
    typing: TypingCoordinator,
    receipts: ReadReceiptCoordinator,
    directory: ConversationDirectory,
    /// The open conversation as it was when opened; the directory may be
    /// replaced underneath it.
    open: Option<Conversation>,
    stream: Option<MessageStream>,
    search: UserSearch,
    generation: Generation,
}

impl<A: ChatApi> SyncEngine<A> {
    pub fn new(
        api: Arc<A>,
        connector: Arc<dyn ChannelConnector>,
        visibility: Box<dyn VisibilitySignal>,
        settings: SyncSettings,
        queue: mpsc::UnboundedSender<EngineInput>,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        Self {
            api,
            queue,
            events,
            identity: None,
            session: ConnectionSession::new(connector),
            router: EventRouter::new(),
            presence: PresenceTracker::new(),
            typing: TypingCoordinator::new(settings.typing_idle, settings.remote_typing_expiry),
            receipts: ReadReceiptCoordinator::new(visibility),
            directory: ConversationDirectory::new(settings.reorder_on_activity),
            open: None,
            stream: None,
            search: UserSearch::new(settings.search_debounce),
            generation: Generation::default(),
        }
    }

    pub fn execute(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::Login(identity) => self.login(identity),
            ClientCommand::Logout => self.logout(),
            ClientCommand::RefreshDirectory => self.refresh_directory(),
            ClientCommand::SelectConversation(id) => self.select_conversation(&id),
            ClientCommand::OpenWith(other) => self.open_with(other),
            ClientCommand::TextInput => self.text_input(),
            ClientCommand::SendMessage(text) => self.send_message(&text),
            ClientCommand::SetVisible(_) => self.visibility_changed(),
            ClientCommand::Search(query) => self.search(&query),
        }
    }

    // ---- session lifecycle ----

    pub fn login(&mut self, identity: UserId) {
        if self.identity.as_ref() == Some(&identity) {
            return;
        }
        if self.identity.is_some() {
            self.logout();
        }
        log::info!("Logging in as {identity}");
        self.identity = Some(identity.clone());
        self.session.open(identity, &self.queue);
        self.refresh_directory();
    }

    /// Deliberate teardown: every per-identity component is reset and the
    /// channel is closed.
    pub fn logout(&mut self) {
        let Some(identity) = self.identity.take() else {
            return;
        };
        log::info!("Logging out {identity}");
        self.close_conversation();
        self.session.close();
        self.presence.clear();
        self.directory.clear();
        self.search.clear();
        self.publish(ClientEvent::Directory(Vec::new()));
        self.publish(ClientEvent::Presence(Vec::new()));
    }

    // ---- directory ----

    pub fn refresh_directory(&mut self) {
        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(err) => {
                log::warn!("Cannot refresh the directory: {err}");
                return;
            }
        };
        let epoch = self.session.epoch();
        let api = Arc::clone(&self.api);
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let result = api.conversations(&identity).await;
            let _ = queue.send(EngineInput::DirectoryLoaded { epoch, result });
        });
    }

    /// Open a listed conversation. Purely local apart from the room join and
    /// the snapshot fetch it triggers.
    pub fn select_conversation(&mut self, id: &ConversationId) {
        if self.open_conversation_id() == Some(id) {
            return;
        }
        let Some(conversation) = self.directory.select(id).cloned() else {
            log::warn!("Cannot open unknown conversation {id}");
            return;
        };
        self.open_conversation(conversation);
    }

    /// Find or create the conversation with `other`; it is upserted into the
    /// directory and opened when the backend answers.
    pub fn open_with(&mut self, other: UserId) {
        let identity = match self.require_identity() {
            Ok(identity) => identity,
            Err(err) => {
                log::warn!("Cannot open a conversation with {other}: {err}");
                return;
            }
        };
        if !self.search.query().is_empty() {
            self.search.clear();
            self.publish(ClientEvent::SearchResults(Vec::new()));
        }
        let epoch = self.session.epoch();
        let api = Arc::clone(&self.api);
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let result = api.find_or_create(&identity, &other).await;
            let _ = queue.send(EngineInput::ConversationResolved { epoch, result });
        });
    }

    // ---- local actions on the open conversation ----

    /// One keystroke in the message draft.
    pub fn text_input(&mut self) {
        let Some(conversation_id) = self.open_conversation_id().cloned() else {
            return;
        };
        if let Some(is_typing) = self.typing.on_local_input(&self.queue) {
            self.emit(OutboundEvent::Typing {
                conversation_id,
                is_typing,
            });
        }
    }

    /// Blank drafts are ignored. The message itself arrives back as a push.
    pub fn send_message(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let (Some(identity), Some(conversation_id)) =
            (self.identity.clone(), self.open_conversation_id().cloned())
        else {
            log::warn!("No open conversation to send to");
            return;
        };
        let Some(receiver) = self
            .open
            .as_ref()
            .and_then(|c| c.other_participant(&identity))
            .map(|u| u.id.clone())
        else {
            log::warn!("Conversation {conversation_id} has no counterpart for {identity}");
            return;
        };

        self.emit(OutboundEvent::SendMessage {
            conversation_id: conversation_id.clone(),
            sender_id: identity,
            receiver_id: receiver,
            text: text.to_string(),
        });
        if let Some(is_typing) = self.typing.on_send() {
            self.emit(OutboundEvent::Typing {
                conversation_id,
                is_typing,
            });
        }
    }

    /// Re-poll the visibility signal; flushes a held-back read-ack.
    pub fn visibility_changed(&mut self) {
        if !self.receipts.is_visible() {
            return;
        }
        let Some(identity) = self.identity.as_ref() else {
            return;
        };
        if let Some(ack) = self.receipts.on_visible(self.stream.as_ref(), identity) {
            self.emit(ack);
        }
    }

    pub fn search(&mut self, query: &str) {
        if self.search.set_query(query, &self.queue) {
            self.publish(ClientEvent::SearchResults(Vec::new()));
        }
    }

    // ---- asynchronous inputs ----

    pub fn handle(&mut self, input: EngineInput) {
        match input {
            EngineInput::Channel { epoch, event } => self.on_channel(epoch, event),
            EngineInput::DirectoryLoaded { epoch, result } => self.on_directory_loaded(epoch, result),
            EngineInput::HistoryLoaded {
                generation,
                load,
                result,
            } => self.on_history_loaded(generation, load, result),
            EngineInput::ConversationResolved { epoch, result } => {
                self.on_conversation_resolved(epoch, result)
            }
            EngineInput::UsersFetched { query, result } => self.on_users_fetched(query, result),
            EngineInput::TypingIdle(token) => {
                if let Some(is_typing) = self.typing.on_idle_elapsed(token) {
                    if let Some(conversation_id) = self.open_conversation_id().cloned() {
                        self.emit(OutboundEvent::Typing {
                            conversation_id,
                            is_typing,
                        });
                    }
                }
            }
            EngineInput::RemoteTypingExpired(token) => {
                if self.typing.on_remote_expired(token) {
                    self.publish(ClientEvent::RemoteTyping(false));
                }
            }
            EngineInput::SearchDebounced(token) => {
                if let Some(query) = self.search.on_debounced(token) {
                    self.fetch_users(query);
                }
            }
        }
    }

    fn on_channel(&mut self, epoch: SessionEpoch, event: ChannelEvent) {
        if !self.session.accepts(epoch) {
            log::debug!("Dropping {event:?} from closed channel epoch {}", epoch.0);
            return;
        }
        match event {
            ChannelEvent::Connected => {
                self.publish(ClientEvent::ChannelState(ChannelStatus::Connected));
                if self.session.on_connected(epoch) == Some(true) {
                    self.reload_open_conversation();
                }
            }
            ChannelEvent::Disconnected => {
                if self.session.on_disconnected(epoch) {
                    self.publish(ClientEvent::ChannelState(ChannelStatus::Disconnected));
                }
            }
            ChannelEvent::Inbound(event) => self.route(event),
        }
    }

    fn route(&mut self, event: InboundEvent) {
        match self.router.route(event) {
            None => {}
            Some(Dispatch::Presence(users)) => {
                self.presence.replace(users);
                self.publish(ClientEvent::Presence(self.presence.online()));
            }
            Some(Dispatch::Message {
                generation,
                message,
            }) => self.on_push(generation, message),
            Some(Dispatch::Typing {
                generation,
                is_typing,
            }) => {
                if self.open_generation() == Some(generation)
                    && self.typing.on_remote(is_typing, &self.queue)
                {
                    self.publish(ClientEvent::RemoteTyping(is_typing));
                }
            }
            Some(Dispatch::Read {
                generation,
                conversation_id,
            }) => {
                let Some(stream) = self.stream.as_mut().filter(|s| s.generation() == generation)
                else {
                    return;
                };
                if self.receipts.apply_remote_ack(stream, &conversation_id) > 0 {
                    self.publish_messages();
                }
            }
        }
    }

    fn on_push(&mut self, generation: Generation, message: Message) {
        let Some(stream) = self.stream.as_mut().filter(|s| s.generation() == generation) else {
            log::debug!("Dropping message {} for a closed conversation", message.id);
            return;
        };
        let conversation_id = stream.conversation_id().clone();
        if stream.append_incoming(message.clone()) {
            if self.directory.record_activity(&conversation_id, &message) {
                self.publish_directory();
            }
            self.publish_messages();
        } else {
            log::debug!("Message {} already held", message.id);
        }

        if let (Some(identity), Some(stream)) = (self.identity.as_ref(), self.stream.as_ref()) {
            if let Some(ack) = self.receipts.on_incoming(stream, identity) {
                self.emit(ack);
            }
        }
    }

    fn on_directory_loaded(&mut self, epoch: SessionEpoch, result: Result<Vec<Conversation>>) {
        if self.identity.is_none() || epoch != self.session.epoch() {
            log::debug!("Dropping directory snapshot from a previous session");
            return;
        }
        match result {
            Ok(conversations) => {
                log::info!("Loaded {} conversations", conversations.len());
                self.directory.replace(conversations);
                self.publish_directory();
            }
            Err(err) => self.load_failed(LoadTarget::Directory, err),
        }
    }

    fn on_history_loaded(
        &mut self,
        generation: Generation,
        load: LoadTicket,
        result: Result<Vec<Message>>,
    ) {
        let Some(stream) = self.stream.as_mut().filter(|s| s.generation() == generation) else {
            log::debug!("Dropping late message snapshot (generation {})", generation.0);
            return;
        };
        if load != stream.current_load() {
            log::debug!(
                "Dropping superseded snapshot for {} (load {})",
                stream.conversation_id(),
                load.0
            );
            return;
        }
        match result {
            Ok(messages) => {
                log::debug!("Loaded {} messages for {}", messages.len(), stream.conversation_id());
                stream.apply_snapshot(load, messages);
                self.publish_messages();
                if let (Some(identity), Some(stream)) = (self.identity.as_ref(), self.stream.as_ref()) {
                    if let Some(ack) = self.receipts.on_snapshot_loaded(stream, identity) {
                        self.emit(ack);
                    }
                }
            }
            Err(err) => {
                stream.fail_load(load);
                self.load_failed(LoadTarget::Messages, err);
            }
        }
    }

    fn on_conversation_resolved(&mut self, epoch: SessionEpoch, result: Result<Conversation>) {
        if self.identity.is_none() || epoch != self.session.epoch() {
            return;
        }
        match result {
            Ok(conversation) => {
                let id = conversation.id.clone();
                if self.directory.upsert(conversation) {
                    self.publish_directory();
                }
                self.select_conversation(&id);
            }
            Err(err) => self.load_failed(LoadTarget::Conversation, err),
        }
    }

    fn on_users_fetched(&mut self, query: QueryId, result: Result<Vec<UserRef>>) {
        match result {
            Ok(users) => {
                if let Some(results) = self.search.apply_results(query, users) {
                    let results = results.to_vec();
                    self.publish(ClientEvent::SearchResults(results));
                }
            }
            Err(err) => {
                self.search.fail(query);
                self.load_failed(LoadTarget::Users, err);
            }
        }
    }

    // ---- conversation switching ----

    fn open_conversation(&mut self, conversation: Conversation) {
        self.close_conversation();
        self.generation = self.generation.next();
        let id = conversation.id.clone();
        log::info!("Opening conversation {id} (generation {})", self.generation.0);

        let stream = MessageStream::new(id.clone(), self.generation);
        let load = stream.current_load();
        self.stream = Some(stream);
        self.router.subscribe_room(id.clone(), self.generation);
        if let Err(err) = self.session.join_room(id.clone()) {
            log::warn!("Live updates unavailable for {id}: {err}");
        }
        self.open = Some(conversation.clone());
        self.publish(ClientEvent::ConversationOpened(conversation));
        self.spawn_load(id, self.generation, load);
    }

    /// Detach everything bound to the open conversation: the room
    /// subscription, the typing countdown and any held-back read-ack.
    fn close_conversation(&mut self) {
        let previous = self.stream.take();
        self.open = None;
        let remote_was_typing = self.typing.remote_typing();
        let owed = self.typing.reset();
        if let (Some(stream), Some(is_typing)) = (previous.as_ref(), owed) {
            self.emit(OutboundEvent::Typing {
                conversation_id: stream.conversation_id().clone(),
                is_typing,
            });
        }
        self.router.unsubscribe_room();
        self.receipts.reset();
        self.session.leave_room();
        if remote_was_typing {
            self.publish(ClientEvent::RemoteTyping(false));
        }
    }

    fn reload_open_conversation(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        log::info!("Reloading {} after reconnect", stream.conversation_id());
        let load = stream.begin_reload();
        let (id, generation) = (stream.conversation_id().clone(), stream.generation());
        self.spawn_load(id, generation, load);
    }

    fn spawn_load(&self, conversation_id: ConversationId, generation: Generation, load: LoadTicket) {
        let api = Arc::clone(&self.api);
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let result = api.messages(&conversation_id).await;
            let _ = queue.send(EngineInput::HistoryLoaded {
                generation,
                load,
                result,
            });
        });
    }

    fn fetch_users(&self, query: QueryId) {
        let Some(identity) = self.identity.clone() else {
            return;
        };
        let api = Arc::clone(&self.api);
        let queue = self.queue.clone();
        tokio::spawn(async move {
            let result = api.users(&identity).await;
            let _ = queue.send(EngineInput::UsersFetched { query, result });
        });
    }

    // ---- output ----

    fn emit(&self, event: OutboundEvent) {
        let name = event.name();
        if let Err(err) = self.session.emit(event) {
            log::warn!("Dropping `{name}` emission: {err}");
        }
    }

    fn publish(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn publish_directory(&self) {
        self.publish(ClientEvent::Directory(self.directory.conversations().to_vec()));
    }

    fn publish_messages(&self) {
        let (Some(stream), Some(identity)) = (self.stream.as_ref(), self.identity.as_ref()) else {
            return;
        };
        self.publish(ClientEvent::Messages {
            conversation_id: stream.conversation_id().clone(),
            messages: stream.messages().to_vec(),
            seen: stream.last_own_message_seen(identity),
        });
    }

    fn load_failed(&self, target: LoadTarget, err: SyncError) {
        log::warn!("Failed to load {target:?}: {err}");
        self.publish(ClientEvent::LoadFailed {
            target,
            reason: err.to_string(),
        });
    }

    // ---- observation ----

    pub fn identity(&self) -> Option<&UserId> {
        self.identity.as_ref()
    }

    pub fn directory(&self) -> &ConversationDirectory {
        &self.directory
    }

    pub fn stream(&self) -> Option<&MessageStream> {
        self.stream.as_ref()
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn typing(&self) -> &TypingCoordinator {
        &self.typing
    }

    pub fn user_search(&self) -> &UserSearch {
        &self.search
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    /// Whether the counterpart of the open conversation is online.
    pub fn counterpart_online(&self) -> bool {
        let (Some(identity), Some(open)) = (self.identity.as_ref(), self.open.as_ref()) else {
            return false;
        };
        open.other_participant(identity)
            .is_some_and(|other| self.presence.is_online(&other.id))
    }

    fn require_identity(&self) -> Result<UserId> {
        self.identity.clone().ok_or(SyncError::NotLoggedIn)
    }

    fn open_conversation_id(&self) -> Option<&ConversationId> {
        self.stream.as_ref().map(|s| s.conversation_id())
    }

    fn open_generation(&self) -> Option<Generation> {
        self.stream.as_ref().map(|s| s.generation())
    }
}
