use std::collections::HashSet;

use crate::common::UserId;

/// Users currently online, as last pushed by the channel.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: HashSet<UserId>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set wholesale; pushes are full snapshots, never diffs.
    pub fn replace(&mut self, users: Vec<UserId>) {
        self.online = users.into_iter().collect();
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.online.contains(user)
    }

    /// Sorted for stable display.
    pub fn online(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.online.iter().cloned().collect();
        users.sort();
        users
    }

    pub fn len(&self) -> usize {
        self.online.len()
    }

    pub fn is_empty(&self) -> bool {
        self.online.is_empty()
    }

    pub fn clear(&mut self) {
        self.online.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_is_wholesale() {
        let mut presence = PresenceTracker::new();
        presence.replace(vec!["a".into(), "b".into()]);
        assert!(presence.is_online(&"a".into()));

        presence.replace(vec!["c".into(), "c".into()]);
        assert!(!presence.is_online(&"a".into()));
        assert_eq!(presence.online(), vec![UserId::from("c")]);
        assert_eq!(presence.len(), 1);
    }
}
