use super::protocol::InboundEvent;
use crate::common::{ConversationId, Message, UserId};
use crate::state::stream::Generation;

/// Room subscription held for one open conversation. Replacing it drops the
/// previous generation's subscription as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSubscription {
    pub conversation_id: ConversationId,
    pub generation: Generation,
}

/// An inbound event resolved to the component that consumes it. Room-scoped
/// dispatches carry the generation they were routed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Presence(Vec<UserId>),
    Message {
        generation: Generation,
        message: Message,
    },
    Typing {
        generation: Generation,
        is_typing: bool,
    },
    Read {
        generation: Generation,
        conversation_id: ConversationId,
    },
}

/// Single ingress for channel pushes.
#[derive(Debug, Default)]
pub struct EventRouter {
    room: Option<RoomSubscription>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_room(&mut self, conversation_id: ConversationId, generation: Generation) {
        if let Some(previous) = self.room.as_ref() {
            log::debug!(
                "Dropping room subscription for {} (generation {})",
                previous.conversation_id,
                previous.generation.0
            );
        }
        self.room = Some(RoomSubscription {
            conversation_id,
            generation,
        });
    }

    pub fn unsubscribe_room(&mut self) {
        self.room = None;
    }

    /// Presence is always delivered. Room-scoped events need a subscription
    /// and are dropped when they name a different conversation.
    pub fn route(&self, event: InboundEvent) -> Option<Dispatch> {
        if !event.is_room_scoped() {
            return match event {
                InboundEvent::OnlineUsers(users) => Some(Dispatch::Presence(users)),
                _ => None,
            };
        }
        let Some(room) = self.room.as_ref() else {
            log::debug!("No open conversation; ignoring {event:?}");
            return None;
        };
        let generation = room.generation;
        let addressed_elsewhere = |id: Option<&ConversationId>| id.is_some_and(|id| id != &room.conversation_id);

        match event {
            InboundEvent::NewMessage(message) => {
                if addressed_elsewhere(message.conversation_id.as_ref()) {
                    log::debug!("Ignoring message {} for a conversation that is not open", message.id);
                    return None;
                }
                Some(Dispatch::Message {
                    generation,
                    message,
                })
            }
            InboundEvent::UserTyping {
                is_typing,
                conversation_id,
            } => {
                if addressed_elsewhere(conversation_id.as_ref()) {
                    return None;
                }
                Some(Dispatch::Typing {
                    generation,
                    is_typing,
                })
            }
            InboundEvent::MessagesRead { conversation_id } => {
                if addressed_elsewhere(Some(&conversation_id)) {
                    return None;
                }
                Some(Dispatch::Read {
                    generation,
                    conversation_id,
                })
            }
            InboundEvent::OnlineUsers(_) => None,
        }
    }
}
