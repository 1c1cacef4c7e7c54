//! Reflection stage: synthesize the run's final answer.

use std::time::Instant;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::agents::reflector::ReflectorAgent;
use crate::core::types::RunState;
use crate::error::RunFailure;
use crate::io::backend::Backend;
use crate::stage::{RunContext, record_stage};

/// Ask the backend for the final answer and set `state.output` once.
///
/// Every task must be terminal. A backend failure surfaces as
/// [`RunFailure::Reflection`] inside the returned error and leaves the
/// execution log and task results untouched.
pub fn reflect_and_complete<B: Backend>(
    ctx: &RunContext<'_, B>,
    state: &mut RunState,
) -> Result<String> {
    if let Some(open) = state.tasks().iter().find(|task| !task.status.is_terminal()) {
        bail!(
            "cannot reflect while task #{} is {}",
            open.id,
            open.status.as_str()
        );
    }
    if state.output.is_some() {
        bail!("run {} already has an output", state.run_id);
    }

    let stage = ctx.stage_paths(&state.run_id, "reflect")?;
    let agent = ReflectorAgent::new(&ctx.paths.schemas_dir(), ctx.settings);
    let started = Instant::now();
    let reflected = agent.run(
        ctx.backend,
        ctx.workdir(),
        &stage,
        &state.goal,
        state.tasks(),
        &state.execution_log,
    );
    record_stage(&stage, &state.run_id, "reflect", None, started, &reflected);

    let answer = match reflected {
        Ok(output) => output.answer,
        Err(err) => {
            warn!(run_id = %state.run_id, err = %format!("{err:#}"), "reflection failed");
            return Err(RunFailure::Reflection(format!("{err:#}")).into());
        }
    };

    state.set_output(answer.clone())?;
    state.log("Task execution complete");
    info!(run_id = %state.run_id, "run reflected");
    Ok(answer)
}
