//! Plan-and-execute task agent.
//!
//! A run turns a free-form goal into an ordered task list, executes each task
//! through a registered capability or a direct reasoning answer, and
//! synthesizes a final answer. The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (types, transition table,
//!   selection, argument validation, invariants). No I/O.
//! - **[`io`]**: Side effects (backend process, prompts, config, checkpoints,
//!   stage artifacts). Isolated so tests can script the backend.
//! - **[`capability`]**: The capability registry and built-in capabilities.
//!
//! Stage modules ([`plan`], [`select`], [`execute`], [`reflect`]) combine the
//! two, and [`orchestrator`] drives them through the state machine.

pub mod agents;
pub mod capability;
pub mod core;
pub mod error;
pub mod execute;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod plan;
pub mod reflect;
pub mod select;
pub mod stage;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
