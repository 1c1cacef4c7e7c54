//! Run orchestration: plan, gate, select/execute loop, reflect.
//!
//! The orchestrator owns phase changes. Every transition goes through
//! [`transition`], is checked against the run invariants, and is persisted so
//! a confirm-mode run can be resumed from its checkpoint by `approve` or
//! `reject`, and a crashed run leaves a readable record.

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info};

use crate::core::invariants::validate_run_state;
use crate::core::machine::{Event, transition};
use crate::core::types::{Mode, Phase, RunState};
use crate::error::RunFailure;
use crate::execute::execute_current_task;
use crate::io::backend::Backend;
use crate::io::run_store::RunStore;
use crate::plan::synthesize_plan;
use crate::reflect::reflect_and_complete;
use crate::select::{Selection, select_next_task};
use crate::stage::RunContext;

/// Where a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Reflection produced the final answer.
    Done { output: String },
    /// Planned in confirm mode; waiting for `approve` or `reject`.
    AwaitingApproval,
    /// Planning or reflection failed.
    Failed { failure: String },
    /// Rejected at the gate.
    Cancelled,
}

/// Outcome plus the final state of the run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub state: RunState,
}

impl RunReport {
    pub fn run_id(&self) -> &str {
        &self.state.run_id
    }
}

/// Drives runs against one backend and capability registry.
#[derive(Debug)]
pub struct Orchestrator<'a, B> {
    ctx: RunContext<'a, B>,
    store: RunStore,
}

impl<'a, B: Backend> Orchestrator<'a, B> {
    pub fn new(ctx: RunContext<'a, B>) -> Self {
        Self {
            store: RunStore::new(ctx.paths.clone()),
            ctx,
        }
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Create a run for `goal`, plan it, and continue until the gate (confirm)
    /// or a terminal phase (auto).
    pub fn start(&self, goal: &str, mode: Mode) -> Result<RunReport> {
        if goal.trim().is_empty() {
            bail!("goal must be non-empty");
        }
        let run_id = self.store.allocate_run_id()?;
        let state = RunState::new(run_id, goal.trim(), mode);
        self.store.save(&state)?;
        info!(run_id = %state.run_id, mode = mode.as_str(), "run started");
        self.drive(state)
    }

    /// Approve a run waiting at the gate and execute it to completion. The
    /// plan is reused as is.
    pub fn approve(&self, run_id: &str) -> Result<RunReport> {
        let mut state = self.load_at_gate(run_id)?;
        state.approve()?;
        self.store.save(&state)?;
        info!(run_id, "plan approved");
        self.drive(state)
    }

    /// Cancel a run waiting at the gate. No task runs and no output is set.
    pub fn reject(&self, run_id: &str) -> Result<RunReport> {
        let mut state = self.load_at_gate(run_id)?;
        self.advance(&mut state, Event::Rejected)?;
        info!(run_id, "plan rejected");
        Ok(RunReport {
            outcome: RunOutcome::Cancelled,
            state,
        })
    }

    fn load_at_gate(&self, run_id: &str) -> Result<RunState> {
        let state = self
            .store
            .load(run_id)
            .with_context(|| format!("load run {run_id}"))?;
        if state.phase.is_terminal() {
            bail!("run {run_id} already finished as {}", state.phase);
        }
        if state.phase != Phase::AwaitingApproval {
            bail!(
                "run {run_id} is {}, not awaiting approval",
                state.phase
            );
        }
        Ok(state)
    }

    /// Run the state machine until it suspends or terminates.
    pub fn drive(&self, mut state: RunState) -> Result<RunReport> {
        // Each planned task is selected at most once, plus one final
        // `Exhausted` selection.
        let mut selections = 0usize;

        loop {
            debug!(run_id = %state.run_id, phase = %state.phase, "driving");
            match state.phase {
                Phase::Planning => match synthesize_plan(&self.ctx, &mut state) {
                    Ok(_) => self.advance(&mut state, Event::Planned)?,
                    Err(err) => self.fail(&mut state, err, Event::PlanningFailed)?,
                },
                Phase::AwaitingApproval => {
                    if !state.approved {
                        return Ok(RunReport {
                            outcome: RunOutcome::AwaitingApproval,
                            state,
                        });
                    }
                    self.advance(&mut state, Event::Approved)?;
                }
                Phase::Selecting => {
                    selections += 1;
                    if selections > state.tasks().len() + 1 {
                        bail!("run {} selected more tasks than were planned", state.run_id);
                    }
                    match select_next_task(&mut state)? {
                        Selection::Selected(_) => self.advance(&mut state, Event::TaskSelected)?,
                        Selection::Exhausted => self.advance(&mut state, Event::Exhausted)?,
                    }
                }
                Phase::Executing => {
                    execute_current_task(&self.ctx, &mut state)?;
                    self.advance(&mut state, Event::TaskFinished)?;
                }
                Phase::Reflecting => match reflect_and_complete(&self.ctx, &mut state) {
                    Ok(_) => self.advance(&mut state, Event::Reflected)?,
                    Err(err) => self.fail(&mut state, err, Event::ReflectionFailed)?,
                },
                Phase::Done => {
                    let output = state
                        .output
                        .clone()
                        .ok_or_else(|| anyhow!("run {} is done without output", state.run_id))?;
                    return Ok(RunReport {
                        outcome: RunOutcome::Done { output },
                        state,
                    });
                }
                Phase::Failed => {
                    let failure = state.failure.clone().unwrap_or_default();
                    return Ok(RunReport {
                        outcome: RunOutcome::Failed { failure },
                        state,
                    });
                }
                Phase::Cancelled => {
                    return Ok(RunReport {
                        outcome: RunOutcome::Cancelled,
                        state,
                    });
                }
            }
        }
    }

    /// Record a run-level failure. Any other error is returned unchanged.
    fn fail(&self, state: &mut RunState, err: anyhow::Error, event: Event) -> Result<()> {
        let failure = err.downcast::<RunFailure>()?;
        state.failure = Some(failure.to_string());
        self.advance(state, event)
    }

    fn advance(&self, state: &mut RunState, event: Event) -> Result<()> {
        let next = transition(state.phase, event)?;
        debug!(run_id = %state.run_id, from = %state.phase, to = %next, ?event, "transition");
        state.phase = next;

        let violations = validate_run_state(state);
        if !violations.is_empty() {
            bail!(
                "run {} violates invariants after {event:?}: {}",
                state.run_id,
                violations.join("; ")
            );
        }
        self.store.save(state)
    }
}
