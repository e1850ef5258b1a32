use std::collections::HashSet;

use crate::common::{Conversation, ConversationId, Message};

/// The current user's conversations, in display order. Sole writer of
/// conversation membership.
#[derive(Debug, Default)]
pub struct ConversationDirectory {
    conversations: Vec<Conversation>,
    selected: Option<ConversationId>,
    /// Upserted locally and not yet seen in a server snapshot.
    unconfirmed: HashSet<ConversationId>,
    reorder_on_activity: bool,
}

impl ConversationDirectory {
    pub fn new(reorder_on_activity: bool) -> Self {
        Self {
            conversations: Vec::new(),
            selected: None,
            unconfirmed: HashSet::new(),
            reorder_on_activity,
        }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.get(id).is_some()
    }

    /// Replace the list with a server snapshot (already recency-ordered).
    /// Duplicate ids in the snapshot keep their first occurrence. The
    /// selected conversation and local upserts the snapshot predates stay
    /// listed at the front, in their current order.
    pub fn replace(&mut self, snapshot: Vec<Conversation>) {
        let mut listed: Vec<Conversation> = Vec::with_capacity(snapshot.len());
        for conversation in snapshot {
            if !listed.iter().any(|c| c.id == conversation.id) {
                listed.push(conversation);
            }
        }
        self.unconfirmed.retain(|id| !listed.iter().any(|c| &c.id == id));

        let mut list: Vec<Conversation> = std::mem::take(&mut self.conversations)
            .into_iter()
            .filter(|c| {
                (self.unconfirmed.contains(&c.id) || self.selected.as_ref() == Some(&c.id))
                    && !listed.iter().any(|l| l.id == c.id)
            })
            .collect();
        if !list.is_empty() {
            log::debug!("Keeping {} conversations missing from the snapshot", list.len());
        }
        list.extend(listed);
        self.conversations = list;
    }

    /// Upsert a find-or-create result. A known id leaves the list untouched
    /// (first-seen wins); a new one is prepended. Returns whether it was new.
    pub fn upsert(&mut self, conversation: Conversation) -> bool {
        if self.contains(&conversation.id) {
            log::debug!("Conversation {} already listed; keeping first-seen entry", conversation.id);
            return false;
        }
        self.unconfirmed.insert(conversation.id.clone());
        self.conversations.insert(0, conversation);
        true
    }

    /// Pure local state change. Returns the conversation if it is listed.
    pub fn select(&mut self, id: &ConversationId) -> Option<&Conversation> {
        let index = self.conversations.iter().position(|c| &c.id == id)?;
        self.selected = Some(id.clone());
        self.conversations.get(index)
    }

    /// Refresh the digest after a message was sent or received. Moves the
    /// conversation to the front only when reordering is enabled. Returns
    /// whether anything changed.
    pub fn record_activity(&mut self, id: &ConversationId, message: &Message) -> bool {
        let Some(index) = self.conversations.iter().position(|c| &c.id == id) else {
            return false;
        };
        let conversation = &mut self.conversations[index];
        if conversation
            .last_message()
            .is_some_and(|last| last.order_key() >= message.order_key())
        {
            return false;
        }
        conversation.messages.insert(0, message.clone());
        conversation.messages.truncate(1);

        if self.reorder_on_activity && index > 0 {
            let conversation = self.conversations.remove(index);
            self.conversations.insert(0, conversation);
        }
        true
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
        self.selected = None;
        self.unconfirmed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::UserRef;
    use chrono::{TimeZone, Utc};

    fn conversation(id: &str, a: &str, b: &str) -> Conversation {
        Conversation {
            id: id.into(),
            participants: vec![UserRef::new(a, a), UserRef::new(b, b)],
            messages: Vec::new(),
        }
    }

    fn message(id: &str, secs: i64) -> Message {
        Message {
            id: id.into(),
            sender: UserRef::new("a", "a"),
            text: id.to_string(),
            is_read: false,
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            conversation_id: None,
        }
    }

    fn order(directory: &ConversationDirectory) -> Vec<&str> {
        directory.conversations().iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_upsert_keeps_first_seen() {
        let mut directory = ConversationDirectory::new(false);
        directory.replace(vec![conversation("c1", "me", "x")]);

        assert!(directory.upsert(conversation("c2", "me", "bob")));
        let mut duplicate = conversation("c2", "me", "bob");
        duplicate.messages.push(message("m", 1));
        assert!(!directory.upsert(duplicate));

        assert_eq!(order(&directory), vec!["c2", "c1"]);
        assert!(directory.get(&"c2".into()).unwrap().messages.is_empty());
    }

    #[test]
    fn test_select_is_local() {
        let mut directory = ConversationDirectory::new(false);
        directory.replace(vec![conversation("c1", "me", "x"), conversation("c2", "me", "y")]);
        assert!(directory.select(&"missing".into()).is_none());
        assert_eq!(directory.select(&"c2".into()).unwrap().id.as_str(), "c2");
        assert_eq!(order(&directory), vec!["c1", "c2"]);

        directory.replace(vec![conversation("c1", "me", "x")]);
        assert_eq!(order(&directory), vec!["c2", "c1"]);
    }

    #[test]
    fn test_activity_updates_digest_without_reorder() {
        let mut directory = ConversationDirectory::new(false);
        directory.replace(vec![conversation("c1", "me", "x"), conversation("c2", "me", "y")]);

        assert!(directory.record_activity(&"c2".into(), &message("m2", 2)));
        assert!(!directory.record_activity(&"c2".into(), &message("m1", 1)));
        assert_eq!(order(&directory), vec!["c1", "c2"]);
        let digest = directory.get(&"c2".into()).unwrap().last_message().unwrap();
        assert_eq!(digest.id.as_str(), "m2");
    }

    #[test]
    fn test_activity_reorders_when_enabled() {
        let mut directory = ConversationDirectory::new(true);
        directory.replace(vec![conversation("c1", "me", "x"), conversation("c2", "me", "y")]);
        directory.record_activity(&"c2".into(), &message("m", 1));
        assert_eq!(order(&directory), vec!["c2", "c1"]);
    }

    #[test]
    fn test_snapshot_predating_upsert_keeps_it() {
        let mut directory = ConversationDirectory::new(false);
        assert!(directory.upsert(conversation("new", "me", "dave")));
        directory.replace(vec![conversation("c1", "me", "x"), conversation("c2", "me", "y")]);
        assert_eq!(order(&directory), vec!["new", "c1", "c2"]);

        // Once a snapshot lists it, it is an ordinary entry again.
        directory.replace(vec![conversation("c1", "me", "x"), conversation("new", "me", "dave")]);
        assert_eq!(order(&directory), vec!["c1", "new"]);
        directory.replace(vec![conversation("c1", "me", "x")]);
        assert_eq!(order(&directory), vec!["c1"]);
    }
}
