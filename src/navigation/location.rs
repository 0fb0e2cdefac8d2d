//! Browser-history abstraction.
//!
//! # Responsibilities
//! - Expose the current path and push/replace of history entries
//! - Broadcast back/forward moves as `PopStateEvent`s
//! - Provide `MemoryLocation`, an in-process history stack
//!
//! # Design Decisions
//! - Every entry carries a `HistoryState`, so a popstate can restore the navigation it came from
//! - Popstate delivery uses a `tokio::sync::broadcast` channel; a lagging listener loses old moves

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Stored with each history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    pub navigation_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// The user moved through history.
#[derive(Debug, Clone, PartialEq)]
pub struct PopStateEvent {
    pub url: String,
    pub state: Option<HistoryState>,
}

/// Where the router reads and writes the visible URL.
pub trait Location: Send + Sync {
    fn path(&self) -> String;

    fn state(&self) -> Option<HistoryState>;

    fn push_state(&self, url: &str, state: HistoryState);

    fn replace_state(&self, url: &str, state: HistoryState);

    fn subscribe(&self) -> broadcast::Receiver<PopStateEvent>;
}

#[derive(Debug)]
struct History {
    entries: Vec<(String, Option<HistoryState>)>,
    index: usize,
}

/// History kept in memory.
#[derive(Debug)]
pub struct MemoryLocation {
    history: Mutex<History>,
    popstate: broadcast::Sender<PopStateEvent>,
}

const POPSTATE_CAPACITY: usize = 64;

impl MemoryLocation {
    pub fn new(initial: impl Into<String>) -> Self {
        let (popstate, _) = broadcast::channel(POPSTATE_CAPACITY);
        Self {
            history: Mutex::new(History {
                entries: vec![(initial.into(), None)],
                index: 0,
            }),
            popstate,
        }
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.history().entries.iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn index(&self) -> usize {
        self.history().index
    }

    pub fn back(&self) -> bool {
        self.go(-1)
    }

    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Move `delta` entries and broadcast a popstate. Out-of-range moves do nothing.
    pub fn go(&self, delta: isize) -> bool {
        let event = {
            let mut history = self.history();
            let Some(target) = history.index.checked_add_signed(delta) else {
                return false;
            };
            if delta == 0 || target >= history.entries.len() {
                return false;
            }
            history.index = target;
            let (url, state) = history.entries[target].clone();
            PopStateEvent { url, state }
        };
        tracing::debug!(url = %event.url, delta, "History moved");
        let _ = self.popstate.send(event);
        true
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Location for MemoryLocation {
    fn path(&self) -> String {
        let history = self.history();
        history.entries[history.index].0.clone()
    }

    fn state(&self) -> Option<HistoryState> {
        let history = self.history();
        history.entries[history.index].1.clone()
    }

    fn push_state(&self, url: &str, state: HistoryState) {
        let mut history = self.history();
        let next = history.index + 1;
        history.entries.truncate(next);
        history.entries.push((url.to_string(), Some(state)));
        history.index = next;
    }

    fn replace_state(&self, url: &str, state: HistoryState) {
        let mut history = self.history();
        let index = history.index;
        history.entries[index] = (url.to_string(), Some(state));
    }

    fn subscribe(&self) -> broadcast::Receiver<PopStateEvent> {
        self.popstate.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: u64) -> HistoryState {
        HistoryState {
            navigation_id: id,
            extra: None,
        }
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let location = MemoryLocation::new("/");
        location.push_state("/a", state(1));
        location.push_state("/b", state(2));
        assert!(location.back());
        location.push_state("/c", state(3));

        assert_eq!(location.entries(), vec!["/", "/a", "/c"]);
        assert_eq!(location.path(), "/c");
    }

    #[tokio::test]
    async fn test_back_broadcasts_popstate() {
        let location = MemoryLocation::new("/");
        location.push_state("/a", state(1));
        let mut events = location.subscribe();

        assert!(location.back());
        let event = events.recv().await.unwrap();
        assert_eq!(event.url, "/");
        assert_eq!(event.state, None);

        assert!(location.forward());
        let event = events.recv().await.unwrap();
        assert_eq!(event.state.map(|s| s.navigation_id), Some(1));
    }

    #[test]
    fn test_out_of_range_moves_are_ignored() {
        let location = MemoryLocation::new("/");
        assert!(!location.back());
        assert!(!location.forward());
        assert!(!location.go(5));
        assert_eq!(location.index(), 0);
    }

    #[test]
    fn test_replace_keeps_position() {
        let location = MemoryLocation::new("/");
        location.push_state("/a", state(1));
        location.replace_state("/b", state(2));
        assert_eq!(location.entries(), vec!["/", "/b"]);
        assert_eq!(location.state(), Some(state(2)));
    }
}
