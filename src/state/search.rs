use std::time::Duration;

use tokio::sync::mpsc;

use super::timer::{Countdown, TimerToken};
use crate::common::UserRef;
use crate::engine::EngineInput;

/// Identifies one issued query so late results for older ones can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QueryId(u64);

/// Debounced user lookup, filtered locally by display name.
#[derive(Debug)]
pub struct UserSearch {
    debounce: Duration,
    query: String,
    current: QueryId,
    timer: Countdown,
    searching: bool,
    results: Vec<UserRef>,
}

impl UserSearch {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            query: String::new(),
            current: QueryId::default(),
            timer: Countdown::new(),
            searching: false,
            results: Vec::new(),
        }
    }

    /// New query text. Blank queries clear immediately; anything else waits
    /// for the debounce before a fetch is issued. Returns whether the visible
    /// results were cleared.
    pub fn set_query(&mut self, query: &str, queue: &mpsc::UnboundedSender<EngineInput>) -> bool {
        self.query = query.to_string();
        self.current = QueryId(self.current.0 + 1);
        if query.trim().is_empty() {
            self.timer.cancel();
            self.searching = false;
            let had_results = !self.results.is_empty();
            self.results.clear();
            return had_results;
        }
        self.searching = true;
        self.timer
            .start(self.debounce, queue, EngineInput::SearchDebounced);
        false
    }

    /// The debounce elapsed. Returns the query to fetch for, if still live.
    pub fn on_debounced(&mut self, token: TimerToken) -> Option<QueryId> {
        if !self.timer.expire(token) {
            return None;
        }
        Some(self.current)
    }

    /// Apply fetched users. Results for a superseded query are dropped.
    /// Returns the filtered results when they were applied.
    pub fn apply_results(&mut self, query: QueryId, users: Vec<UserRef>) -> Option<&[UserRef]> {
        if query != self.current {
            log::debug!("Dropping results for superseded search query");
            return None;
        }
        self.searching = false;
        self.results = filter_by_name(users, &self.query);
        Some(&self.results)
    }

    pub fn fail(&mut self, query: QueryId) {
        if query == self.current {
            self.searching = false;
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn results(&self) -> &[UserRef] {
        &self.results
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.current = QueryId(self.current.0 + 1);
        self.timer.cancel();
        self.searching = false;
        self.results.clear();
    }
}

/// Case-insensitive substring match on the display name.
pub fn filter_by_name(users: Vec<UserRef>, query: &str) -> Vec<UserRef> {
    let needle = query.trim().to_lowercase();
    users
        .into_iter()
        .filter(|u| u.display_name.to_lowercase().contains(&needle))
        .collect()
}
