//! Explicit transition table for the orchestration state machine.
//!
//! ```text
//! Planning ──Planned──▶ AwaitingApproval ──Approved──▶ Selecting ⇄ Executing
//!    │                        │                            │
//!    └─PlanningFailed─▶ Failed └─Rejected─▶ Cancelled        └─Exhausted─▶ Reflecting ─▶ Done | Failed
//! ```
//!
//! `auto` runs pass through the gate immediately: the orchestrator feeds
//! `Approved` right after `Planned` because the state starts approved.

use thiserror::Error;

use crate::core::types::Phase;

/// Something that happened in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Planned,
    PlanningFailed,
    Approved,
    Rejected,
    TaskSelected,
    Exhausted,
    TaskFinished,
    Reflected,
    ReflectionFailed,
}

/// A `(phase, event)` pair missing from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition: {event:?} in phase {from}")]
pub struct IllegalTransition {
    pub from: Phase,
    pub event: Event,
}

/// Look up the next phase. Terminal phases accept no events.
pub fn transition(from: Phase, event: Event) -> Result<Phase, IllegalTransition> {
    let next = match (from, event) {
        (Phase::Planning, Event::Planned) => Phase::AwaitingApproval,
        (Phase::Planning, Event::PlanningFailed) => Phase::Failed,
        (Phase::AwaitingApproval, Event::Approved) => Phase::Selecting,
        (Phase::AwaitingApproval, Event::Rejected) => Phase::Cancelled,
        (Phase::Selecting, Event::TaskSelected) => Phase::Executing,
        (Phase::Selecting, Event::Exhausted) => Phase::Reflecting,
        (Phase::Executing, Event::TaskFinished) => Phase::Selecting,
        (Phase::Reflecting, Event::Reflected) => Phase::Done,
        (Phase::Reflecting, Event::ReflectionFailed) => Phase::Failed,
        _ => return Err(IllegalTransition { from, event }),
    };
    Ok(next)
}
