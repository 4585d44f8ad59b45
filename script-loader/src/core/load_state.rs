//! Guarded transitions for the shared load state.
//!
//! Both reactors mutate one cell, and only through [`LoadStateCell::transition`],
//! which applies `from -> to` only while the cell still holds `from`. A late or
//! duplicate attempt therefore observes the newer state and leaves it alone.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::types::LoadState;

/// Single authoritative load state with compare-and-set transitions.
///
/// Clones share the same cell. Observers use [`LoadStateCell::subscribe`].
#[derive(Debug, Clone)]
pub struct LoadStateCell {
    tx: Arc<watch::Sender<LoadState>>,
}

impl Default for LoadStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStateCell {
    /// New cell in [`LoadState::Unloaded`].
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LoadState::Unloaded);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> LoadState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.tx.subscribe()
    }

    /// Move `from -> to` if the cell still holds `from`.
    ///
    /// Returns whether the transition was applied. Pairs outside the state
    /// machine are rejected without touching the cell.
    pub fn transition(&self, from: LoadState, to: LoadState) -> bool {
        if !from.can_transition_to(to) {
            warn!(
                from = from.as_str(),
                to = to.as_str(),
                "rejected undefined load state transition"
            );
            return false;
        }

        let applied = self.tx.send_if_modified(|state| {
            if *state != from {
                return false;
            }
            *state = to;
            true
        });

        if applied {
            info!(from = from.as_str(), to = to.as_str(), "load state transition");
        } else {
            debug!(
                expected = from.as_str(),
                current = self.get().as_str(),
                to = to.as_str(),
                "load state already advanced, transition ignored"
            );
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unloaded() {
        assert_eq!(LoadStateCell::new().get(), LoadState::Unloaded);
    }

    #[test]
    fn first_transition_out_of_unloaded_wins() {
        let cell = LoadStateCell::new();
        assert!(cell.transition(LoadState::Unloaded, LoadState::UrlSkipped));
        assert!(!cell.transition(LoadState::Unloaded, LoadState::UrlLoaded));
        assert_eq!(cell.get(), LoadState::UrlSkipped);
    }

    #[test]
    fn context_loaded_requires_url_skipped() {
        let cell = LoadStateCell::new();
        assert!(!cell.transition(LoadState::UrlSkipped, LoadState::ContextLoaded));
        assert_eq!(cell.get(), LoadState::Unloaded);

        assert!(cell.transition(LoadState::Unloaded, LoadState::UrlSkipped));
        assert!(cell.transition(LoadState::UrlSkipped, LoadState::ContextLoaded));
        assert_eq!(cell.get(), LoadState::ContextLoaded);
    }

    #[test]
    fn terminal_states_are_never_left() {
        let cell = LoadStateCell::new();
        assert!(cell.transition(LoadState::Unloaded, LoadState::UrlLoaded));
        assert!(!cell.transition(LoadState::UrlLoaded, LoadState::UrlSkipped));
        assert!(!cell.transition(LoadState::UrlLoaded, LoadState::Unloaded));
        assert!(!cell.transition(LoadState::UrlSkipped, LoadState::ContextLoaded));
        assert_eq!(cell.get(), LoadState::UrlLoaded);
    }

    #[test]
    fn undefined_pair_is_rejected_even_when_from_matches() {
        let cell = LoadStateCell::new();
        assert!(!cell.transition(LoadState::Unloaded, LoadState::ContextLoaded));
        assert_eq!(cell.get(), LoadState::Unloaded);
    }

    #[test]
    fn clones_share_the_cell_and_notify_watchers() {
        let cell = LoadStateCell::new();
        let mut rx = cell.subscribe();
        let other = cell.clone();
        assert!(other.transition(LoadState::Unloaded, LoadState::UrlSkipped));
        assert!(rx.has_changed().expect("sender alive"));
        assert_eq!(*rx.borrow_and_update(), LoadState::UrlSkipped);
        assert_eq!(cell.get(), LoadState::UrlSkipped);
    }

    #[test]
    fn ignored_transition_does_not_notify() {
        let cell = LoadStateCell::new();
        assert!(cell.transition(LoadState::Unloaded, LoadState::UrlLoaded));
        let rx = cell.subscribe();
        assert!(!cell.transition(LoadState::Unloaded, LoadState::UrlSkipped));
        assert!(!rx.has_changed().expect("sender alive"));
    }
}
