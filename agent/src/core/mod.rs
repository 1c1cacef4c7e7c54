//! Deterministic, pure logic shared by the orchestration stages.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod arguments;
pub mod invariants;
pub mod machine;
pub mod selector;
pub mod types;
