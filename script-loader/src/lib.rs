//! Live-view script loader.
//!
//! Decides, on page load and on every navigation, which script a live-view
//! session runs: the one named by the URL, or the default held by the script
//! context. The crate keeps the same split as the rest of the workspace:
//!
//! - **[`core`]**: Pure, deterministic logic (load-state transitions, entity
//!   classification, vis parsing, argument resolution, mutation detection).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Collaborators with side effects or async behavior (navigation
//!   stream, script catalog, script/results context, executors, config).
//!
//! [`loader`] coordinates core logic with the collaborators: it runs the
//! URL-change reactor and the context-default reactor against one shared
//! [`core::load_state::LoadStateCell`].

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod loader;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
