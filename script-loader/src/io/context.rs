//! Script and results context collaborators.
//!
//! The loader reads and publishes the active selection through
//! [`ScriptContext`] and discards stale output through [`ResultsSink`]. Both are
//! injected; [`SessionContext`] and [`SessionResults`] are the in-process
//! implementations used by the CLI and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::core::args::args_for_vis;
use crate::core::types::{Args, LiveViewPage, Selection};
use crate::core::vis::{Vis, parse_vis};

/// Active script selection plus the error-reporting helpers.
pub trait ScriptContext: Send + Sync {
    /// Current selection (the context defaults until something is published).
    fn selection(&self) -> Selection;

    /// Notified whenever the selection changes.
    fn watch_selection(&self) -> watch::Receiver<Selection>;

    /// Publish a new active selection.
    fn set_script(&self, vis: Vis, pxl: String, args: Args, id: String, page: LiveViewPage);

    /// Parse `source`, reporting failures on the context's error channel.
    fn parse_vis_or_show_error(&self, source: &str) -> Option<Vis>;

    /// Resolve arguments, reporting failures on the context's error channel.
    fn args_for_vis_or_show_error(&self, vis: &Vis, args: &Args, script_id: &str) -> Option<Args>;
}

/// Sink whose output must be cleared before a new selection is published.
pub trait ResultsSink: Send + Sync {
    fn clear_results(&self);
}

/// In-process script context backed by a `watch` channel.
///
/// Errors shown through the `*_or_show_error` helpers are logged and kept for
/// inspection.
#[derive(Debug)]
pub struct SessionContext {
    selection: watch::Sender<Selection>,
    errors: Mutex<Vec<String>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(Selection::default())
    }
}

impl SessionContext {
    pub fn new(defaults: Selection) -> Self {
        let (selection, _) = watch::channel(defaults);
        Self {
            selection,
            errors: Mutex::new(Vec::new()),
        }
    }

    /// Replace the default selection (e.g. once the session picks one).
    pub fn set_defaults(&self, defaults: Selection) {
        debug!(id = %defaults.id, "context defaults updated");
        self.selection.send_replace(defaults);
    }

    pub fn show_error(&self, message: String) {
        warn!(error = %message, "script error");
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Errors shown so far, oldest first.
    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ScriptContext for SessionContext {
    fn selection(&self) -> Selection {
        self.selection.borrow().clone()
    }

    fn watch_selection(&self) -> watch::Receiver<Selection> {
        self.selection.subscribe()
    }

    fn set_script(&self, vis: Vis, pxl: String, args: Args, id: String, page: LiveViewPage) {
        debug!(id = %id, page = ?page, "publishing script selection");
        self.selection.send_replace(Selection {
            pxl,
            vis: Some(vis),
            args,
            id,
            live_view_page: page,
        });
    }

    fn parse_vis_or_show_error(&self, source: &str) -> Option<Vis> {
        match parse_vis(source) {
            Ok(vis) => Some(vis),
            Err(err) => {
                self.show_error(err);
                None
            }
        }
    }

    fn args_for_vis_or_show_error(&self, vis: &Vis, args: &Args, script_id: &str) -> Option<Args> {
        match args_for_vis(vis, args, script_id) {
            Ok(resolved) => Some(resolved),
            Err(err) => {
                self.show_error(err);
                None
            }
        }
    }
}

/// In-process results store.
#[derive(Debug, Default)]
pub struct SessionResults {
    results: Mutex<Vec<String>>,
    clears: AtomicUsize,
}

impl SessionResults {
    #[cfg(any(test, feature = "test-support"))]
    pub fn push(&self, result: String) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result);
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn results(&self) -> Vec<String> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times results were cleared.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl ResultsSink for SessionResults {
    fn clear_results(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
