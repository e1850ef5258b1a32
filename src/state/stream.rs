use std::collections::HashSet;

use crate::common::{ConversationId, Message, MessageId, UserId};

/// Identifies one open-conversation lifetime. Anything issued under an older
/// generation (a `load`, a room subscription) is stale once the user switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Identifies one snapshot fetch issued for a stream. Only the most recently
/// issued load may replace the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Loaded,
    /// The snapshot fetch failed; pushes are still merged.
    Failed,
}

/// Ordered message log of the one open conversation.
///
/// The log is kept sorted by [`Message::order_key`] at all times, so pushes
/// that race ahead of or behind the snapshot land in the same place.
#[derive(Debug)]
pub struct MessageStream {
    conversation_id: ConversationId,
    generation: Generation,
    messages: Vec<Message>,
    state: LoadState,
    load: LoadTicket,
    /// Ids pushed while the snapshot was in flight.
    pushed_during_load: HashSet<MessageId>,
}

impl MessageStream {
    /// A fresh stream starts out loading; the caller issues the fetch.
    pub fn new(conversation_id: ConversationId, generation: Generation) -> Self {
        Self {
            conversation_id,
            generation,
            messages: Vec::new(),
            state: LoadState::Loading,
            load: LoadTicket(1),
            pushed_during_load: HashSet::new(),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    /// Display order: ascending `(createdAt, id)`.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }

    /// The load whose result is still awaited (or was applied last).
    pub fn current_load(&self) -> LoadTicket {
        self.load
    }

    /// Restart for a reload of the same conversation (e.g. after reconnect).
    /// Any load still in flight is superseded; pushes it was tracking stay
    /// tracked until the new one lands.
    pub fn begin_reload(&mut self) -> LoadTicket {
        self.load = LoadTicket(self.load.0 + 1);
        self.state = LoadState::Loading;
        self.load
    }

    /// Replace the log with the snapshot fetched under `ticket`. Messages
    /// pushed while the fetch was in flight and missing from the snapshot are
    /// kept, and anything already read locally stays read. Returns `false`
    /// and changes nothing when `ticket` was superseded.
    pub fn apply_snapshot(&mut self, ticket: LoadTicket, snapshot: Vec<Message>) -> bool {
        if ticket != self.load {
            return false;
        }
        let previous = std::mem::take(&mut self.messages);
        let read: HashSet<MessageId> = previous
            .iter()
            .filter(|m| m.is_read)
            .map(|m| m.id.clone())
            .collect();

        let mut seen = HashSet::new();
        let mut log: Vec<Message> = snapshot
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        for message in &mut log {
            if read.contains(&message.id) {
                message.is_read = true;
            }
        }

        let pushed = std::mem::take(&mut self.pushed_during_load);
        log.extend(
            previous
                .into_iter()
                .filter(|m| pushed.contains(&m.id) && !seen.contains(&m.id)),
        );

        log.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        self.messages = log;
        self.state = LoadState::Loaded;
        true
    }

    /// Returns `false` when `ticket` was superseded.
    pub fn fail_load(&mut self, ticket: LoadTicket) -> bool {
        if ticket != self.load {
            return false;
        }
        self.state = LoadState::Failed;
        self.pushed_during_load.clear();
        true
    }

    /// Merge one pushed message. Returns `false` when the id is already held.
    pub fn append_incoming(&mut self, message: Message) -> bool {
        if self.contains(&message.id) {
            return false;
        }
        if self.is_loading() {
            self.pushed_during_load.insert(message.id.clone());
        }
        let position = self
            .messages
            .partition_point(|m| m.order_key() <= message.order_key());
        self.messages.insert(position, message);
        true
    }

    /// Forward-only: returns how many messages flipped from unread.
    pub fn mark_all_read(&mut self) -> usize {
        let mut flipped = 0;
        for message in self.messages.iter_mut().filter(|m| !m.is_read) {
            message.is_read = true;
            flipped += 1;
        }
        flipped
    }

    /// Whether `me`'s most recent message has been read by the other side.
    pub fn last_own_message_seen(&self, me: &UserId) -> bool {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_from(me))
            .is_some_and(|m| m.is_read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::UserRef;
    use chrono::{TimeZone, Utc};

    fn message(id: &str, secs: i64, sender: &str) -> Message {
        Message {
            id: id.into(),
            sender: UserRef::new(sender, sender),
            text: format!("text {id}"),
            is_read: false,
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            conversation_id: None,
        }
    }

    fn ids(stream: &MessageStream) -> Vec<&str> {
        stream.messages().iter().map(|m| m.id.as_str()).collect()
    }

    fn stream() -> MessageStream {
        MessageStream::new("c1".into(), Generation(1))
    }

    #[test]
    fn test_append_is_idempotent() {
        let mut stream = stream();
        stream.apply_snapshot(stream.current_load(), Vec::new());
        assert!(stream.append_incoming(message("a", 1, "u1")));
        let once = stream.messages().to_vec();
        assert!(!stream.append_incoming(message("a", 1, "u1")));
        assert_eq!(stream.messages(), once.as_slice());
    }

    #[test]
    fn test_order_is_independent_of_arrival() {
        let mut stream = stream();
        stream.append_incoming(message("d", 30, "u1"));
        stream.apply_snapshot(stream.current_load(), vec![message("c", 20, "u1"), message("a", 10, "u2")]);
        stream.append_incoming(message("b", 10, "u1"));
        stream.append_incoming(message("e", 5, "u2"));

        assert_eq!(ids(&stream), vec!["e", "a", "b", "c", "d"]);
        assert!(
            stream
                .messages()
                .windows(2)
                .all(|w| w[0].order_key() <= w[1].order_key())
        );
    }

    #[test]
    fn test_push_before_snapshot_containing_it_yields_one_copy() {
        let mut stream = stream();
        stream.append_incoming(message("x", 5, "u2"));
        stream.apply_snapshot(stream.current_load(), vec![message("w", 1, "u1"), message("x", 5, "u2")]);
        assert_eq!(ids(&stream), vec!["w", "x"]);
        assert_eq!(stream.state(), LoadState::Loaded);
    }

    #[test]
    fn test_push_missing_from_snapshot_survives() {
        let mut stream = stream();
        stream.append_incoming(message("late", 50, "u2"));
        stream.apply_snapshot(stream.current_load(), vec![message("old", 1, "u1")]);
        assert_eq!(ids(&stream), vec!["old", "late"]);
    }

    #[test]
    fn test_snapshot_deduplicates_ids() {
        let mut stream = stream();
        stream.apply_snapshot(stream.current_load(), vec![message("a", 1, "u1"), message("a", 1, "u1")]);
        assert_eq!(stream.len(), 1);
    }

    #[test]
    fn test_read_state_is_monotonic() {
        let mut stream = stream();
        stream.apply_snapshot(stream.current_load(), vec![message("a", 1, "u1")]);
        assert_eq!(stream.mark_all_read(), 1);

        stream.begin_reload();
        stream.apply_snapshot(stream.current_load(), vec![message("a", 1, "u1"), message("b", 2, "u2")]);
        let read: Vec<bool> = stream.messages().iter().map(|m| m.is_read).collect();
        assert_eq!(read, vec![true, false]);

        let mut unread_copy = message("a", 1, "u1");
        unread_copy.is_read = false;
        stream.append_incoming(unread_copy);
        assert!(stream.messages()[0].is_read);
        assert_eq!(stream.mark_all_read(), 1);
    }

    #[test]
    fn test_seen_marker_tracks_latest_own_message() {
        let me = UserId::from("me");
        let mut stream = stream();
        let mut first = message("a", 1, "me");
        first.is_read = true;
        stream.apply_snapshot(stream.current_load(), vec![first, message("b", 2, "other")]);
        assert!(stream.last_own_message_seen(&me));

        stream.append_incoming(message("c", 3, "me"));
        assert!(!stream.last_own_message_seen(&me));
        stream.mark_all_read();
        assert!(stream.last_own_message_seen(&me));
    }

    #[test]
    fn test_superseded_load_is_ignored() {
        let mut stream = stream();
        let first = stream.current_load();
        let reload = stream.begin_reload();

        assert!(!stream.apply_snapshot(first, vec![message("a", 1, "u1")]));
        assert!(!stream.fail_load(first));
        assert!(stream.is_loading());
        assert!(stream.is_empty());

        assert!(stream.apply_snapshot(reload, vec![message("a", 1, "u1")]));
        assert_eq!(stream.state(), LoadState::Loaded);
    }

    #[test]
    fn test_push_survives_overlapping_reload() {
        let mut stream = stream();
        let first = stream.current_load();
        stream.append_incoming(message("early", 3, "u2"));
        let reload = stream.begin_reload();

        stream.apply_snapshot(first, vec![message("a", 1, "u1")]);
        stream.append_incoming(message("late", 5, "u2"));
        stream.apply_snapshot(reload, vec![message("a", 1, "u1")]);
        assert_eq!(ids(&stream), vec!["a", "early", "late"]);
    }
}
