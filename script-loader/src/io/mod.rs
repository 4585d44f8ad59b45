//! Collaborators the loader reactors consume.

pub mod catalog;
pub mod config;
pub mod context;
pub mod executor;
pub mod navigation;
