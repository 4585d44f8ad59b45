//! Stable exit codes for the `script-loader` CLI.

/// At least one execution request was issued.
pub const OK: i32 = 0;
/// Invalid config, script bundle, URL, or another error.
pub const INVALID: i32 = 1;
/// Replay finished without issuing any execution request.
pub const NOTHING_EXECUTED: i32 = 2;
