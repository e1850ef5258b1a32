use std::collections::HashSet;

use wavenet_chat::common::{
    ChannelStatus, ClientEvent, Conversation, ConversationId, Message, MessageId, UserId, UserRef,
};

/// What the terminal has shown so far, rebuilt from engine events.
pub struct AppState {
    pub me: UserId,
    pub conversations: Vec<Conversation>,
    pub open: Option<Conversation>,
    pub messages: Vec<Message>,
    pub seen: bool,
    pub online: HashSet<UserId>,
    pub remote_typing: bool,
    pub search_results: Vec<UserRef>,
    pub connected: bool,
    printed: HashSet<MessageId>,
}

/// Something worth printing after an event was applied.
#[derive(Debug, PartialEq)]
pub enum Update {
    Directory,
    Opened(ConversationId),
    NewMessages(Vec<Message>),
    Seen,
    Typing(bool),
    Online(bool),
    SearchResults,
    Failed(String),
    Connection(bool),
}

impl AppState {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            conversations: Vec::new(),
            open: None,
            messages: Vec::new(),
            seen: false,
            online: HashSet::new(),
            remote_typing: false,
            search_results: Vec::new(),
            connected: false,
            printed: HashSet::new(),
        }
    }

    pub fn counterpart(&self) -> Option<&UserRef> {
        self.open.as_ref()?.other_participant(&self.me)
    }

    pub fn apply(&mut self, event: ClientEvent) -> Vec<Update> {
        match event {
            ClientEvent::Directory(conversations) => {
                self.conversations = conversations;
                vec![Update::Directory]
            }
            ClientEvent::ConversationOpened(conversation) => {
                let id = conversation.id.clone();
                self.open = Some(conversation);
                self.messages.clear();
                self.printed.clear();
                self.seen = false;
                self.remote_typing = false;
                let mut updates = vec![Update::Opened(id)];
                if let Some(other) = self.counterpart() {
                    updates.push(Update::Online(self.online.contains(&other.id)));
                }
                updates
            }
            ClientEvent::Messages {
                conversation_id,
                messages,
                seen,
            } => {
                if self.open.as_ref().map(|c| &c.id) != Some(&conversation_id) {
                    return Vec::new();
                }
                let fresh: Vec<Message> = messages
                    .iter()
                    .filter(|m| self.printed.insert(m.id.clone()))
                    .cloned()
                    .collect();
                self.messages = messages;
                let mut updates = Vec::new();
                if !fresh.is_empty() {
                    updates.push(Update::NewMessages(fresh));
                }
                if seen && !self.seen {
                    updates.push(Update::Seen);
                }
                self.seen = seen;
                updates
            }
            ClientEvent::Presence(users) => {
                let was_online = self.counterpart_online();
                self.online = users.into_iter().collect();
                let now_online = self.counterpart_online();
                if self.open.is_some() && was_online != now_online {
                    vec![Update::Online(now_online)]
                } else {
                    Vec::new()
                }
            }
            ClientEvent::RemoteTyping(typing) => {
                self.remote_typing = typing;
                vec![Update::Typing(typing)]
            }
            ClientEvent::SearchResults(users) => {
                self.search_results = users;
                vec![Update::SearchResults]
            }
            ClientEvent::LoadFailed { target, reason } => {
                vec![Update::Failed(format!("{target:?}: {reason}"))]
            }
            ClientEvent::ChannelState(status) => {
                self.connected = status == ChannelStatus::Connected;
                vec![Update::Connection(self.connected)]
            }
        }
    }

    fn counterpart_online(&self) -> bool {
        self.counterpart()
            .is_some_and(|other| self.online.contains(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, from: &str, secs: i64) -> Message {
        Message {
            id: id.into(),
            sender: UserRef::new(from, from),
            text: format!("text {id}"),
            is_read: false,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            conversation_id: None,
        }
    }

    fn opened(state: &mut AppState) {
        state.apply(ClientEvent::ConversationOpened(Conversation {
            id: "c1".into(),
            participants: vec![UserRef::new("me", "me"), UserRef::new("bob", "Bob")],
            messages: Vec::new(),
        }));
    }

    #[test]
    fn test_only_new_messages_are_reported() {
        let mut state = AppState::new("me".into());
        opened(&mut state);

        let first = state.apply(ClientEvent::Messages {
            conversation_id: "c1".into(),
            messages: vec![message("m1", "bob", 1)],
            seen: false,
        });
        assert_eq!(first, vec![Update::NewMessages(vec![message("m1", "bob", 1)])]);

        let second = state.apply(ClientEvent::Messages {
            conversation_id: "c1".into(),
            messages: vec![message("m1", "bob", 1), message("m2", "me", 2)],
            seen: true,
        });
        assert_eq!(
            second,
            vec![Update::NewMessages(vec![message("m2", "me", 2)]), Update::Seen]
        );
    }

    #[test]
    fn test_presence_reports_counterpart_changes() {
        let mut state = AppState::new("me".into());
        opened(&mut state);

        assert_eq!(
            state.apply(ClientEvent::Presence(vec!["bob".into()])),
            vec![Update::Online(true)]
        );
        assert!(state
            .apply(ClientEvent::Presence(vec!["bob".into(), "carol".into()]))
            .is_empty());
        assert_eq!(
            state.apply(ClientEvent::Presence(Vec::new())),
            vec![Update::Online(false)]
        );
    }

    #[test]
    fn test_messages_for_other_conversation_ignored() {
        let mut state = AppState::new("me".into());
        opened(&mut state);
        assert!(state
            .apply(ClientEvent::Messages {
                conversation_id: "c2".into(),
                messages: vec![message("m1", "bob", 1)],
                seen: false,
            })
            .is_empty());
    }
}
