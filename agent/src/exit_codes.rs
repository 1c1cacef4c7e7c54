//! Stable exit codes for the CLI.

/// The run finished with an answer, or the command succeeded.
pub const OK: i32 = 0;
/// Bad input, config, run id, or an unexpected error.
pub const INVALID: i32 = 1;
/// Planning or reflection failed.
pub const FAILED: i32 = 2;
/// The run is waiting at the approval gate.
pub const AWAITING_APPROVAL: i32 = 3;
/// The run was rejected at the gate.
pub const CANCELLED: i32 = 4;
