//! Deterministic logic shared by the loader reactors.
//!
//! Core modules are free of I/O. They operate on in-memory data and return
//! deterministic outputs suitable for tests.

pub mod args;
pub mod entity;
pub mod load_state;
pub mod pxl;
pub mod types;
pub mod vis;
