use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::stream::MessageStream;
use crate::common::{ConversationId, UserId};
use crate::network::protocol::OutboundEvent;

/// "Is the chat surface actually being looked at right now?"
pub trait VisibilitySignal: Send + Sync {
    fn is_visible(&self) -> bool;
}

impl<F> VisibilitySignal for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_visible(&self) -> bool {
        self()
    }
}

/// Visibility flag flipped by the UI (`ClientCommand::SetVisible`).
#[derive(Debug, Clone)]
pub struct SharedVisibility(Arc<AtomicBool>);

impl SharedVisibility {
    pub fn new(visible: bool) -> Self {
        Self(Arc::new(AtomicBool::new(visible)))
    }

    pub fn set(&self, visible: bool) {
        self.0.store(visible, Ordering::Relaxed);
    }
}

impl VisibilitySignal for SharedVisibility {
    fn is_visible(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Decides when to emit `markAsRead` for the open conversation and applies
/// remote acknowledgements to its log.
///
/// Acks are only emitted while the visibility signal is true. A trigger that
/// arrives while hidden leaves an ack outstanding, which is flushed when the
/// UI reports that the surface became visible again. Emissions are not
/// deduplicated; the backend treats repeated acks idempotently.
pub struct ReadReceiptCoordinator {
    visibility: Box<dyn VisibilitySignal>,
    outstanding: Option<ConversationId>,
}

impl ReadReceiptCoordinator {
    pub fn new(visibility: Box<dyn VisibilitySignal>) -> Self {
        Self {
            visibility,
            outstanding: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.is_visible()
    }

    /// The open conversation's snapshot finished loading.
    pub fn on_snapshot_loaded(&mut self, open: &MessageStream, reader: &UserId) -> Option<OutboundEvent> {
        self.trigger(open.conversation_id(), reader)
    }

    /// A push arrived for the open conversation.
    pub fn on_incoming(&mut self, open: &MessageStream, reader: &UserId) -> Option<OutboundEvent> {
        self.trigger(open.conversation_id(), reader)
    }

    /// The surface regained visibility; emit the ack that was held back, if
    /// it is still for the conversation that is open.
    pub fn on_visible(&mut self, open: Option<&MessageStream>, reader: &UserId) -> Option<OutboundEvent> {
        let pending = self.outstanding.take()?;
        match open {
            Some(stream) if stream.conversation_id() == &pending => self.trigger(&pending, reader),
            _ => None,
        }
    }

    /// Remote `messagesRead`. Only the open conversation is affected; the
    /// transition is forward-only. Returns how many messages flipped.
    pub fn apply_remote_ack(&self, open: &mut MessageStream, conversation_id: &ConversationId) -> usize {
        if open.conversation_id() != conversation_id {
            return 0;
        }
        open.mark_all_read()
    }

    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Conversation switch or teardown.
    pub fn reset(&mut self) {
        self.outstanding = None;
    }

    fn trigger(&mut self, conversation_id: &ConversationId, reader: &UserId) -> Option<OutboundEvent> {
        if !self.visibility.is_visible() {
            log::debug!("Surface hidden; holding read-ack for {conversation_id}");
            self.outstanding = Some(conversation_id.clone());
            return None;
        }
        self.outstanding = None;
        Some(OutboundEvent::MarkAsRead {
            conversation_id: conversation_id.clone(),
            reader_id: reader.clone(),
        })
    }
}
