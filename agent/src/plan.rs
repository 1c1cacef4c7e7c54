//! Plan synthesis: turn the goal into the run's task list.

use std::time::Instant;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::agents::planner::PlannerAgent;
use crate::core::types::RunState;
use crate::error::RunFailure;
use crate::io::backend::Backend;
use crate::stage::{RunContext, record_stage};

/// Plan the run and store the tasks on `state`. Returns the task count.
///
/// Backend errors and non-conforming plans surface as [`RunFailure::Planning`]
/// inside the returned error; `state.tasks` stays absent in that case.
pub fn synthesize_plan<B: Backend>(ctx: &RunContext<'_, B>, state: &mut RunState) -> Result<usize> {
    if state.tasks.is_some() {
        bail!("run {} already has a plan", state.run_id);
    }
    if state.goal.trim().is_empty() {
        return Err(RunFailure::Planning("goal is empty".to_string()).into());
    }

    let stage = ctx.stage_paths(&state.run_id, "plan")?;
    let agent = PlannerAgent::new(&ctx.paths.schemas_dir(), ctx.settings);
    let started = Instant::now();

    let planned = ctx.catalogue().and_then(|catalogue| {
        let output = agent.run(ctx.backend, ctx.workdir(), &stage, &state.goal, &catalogue)?;
        output.into_tasks()
    });
    record_stage(&stage, &state.run_id, "plan", None, started, &planned);

    let tasks = match planned {
        Ok(tasks) => tasks,
        Err(err) => {
            warn!(run_id = %state.run_id, err = %format!("{err:#}"), "planning failed");
            return Err(RunFailure::Planning(format!("{err:#}")).into());
        }
    };

    let count = tasks.len();
    state.tasks = Some(tasks);
    state.log(format!("Generated {count} tasks"));
    info!(run_id = %state.run_id, tasks = count, "plan synthesized");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Mode, TaskStatus};
    use crate::test_support::{ScriptedBackend, TestHarness};
    use serde_json::json;

    #[test]
    fn creates_pending_tasks_and_logs_count() {
        let harness = TestHarness::new();
        let backend = ScriptedBackend::new(vec![json!({"tasks": [
            {"id": 1, "title": "Multiply", "description": "Compute 2 * 5"},
            {"id": 2, "title": "Add", "description": "Add 2 to the product"}
        ]})]);
        let mut state = RunState::new("run-1", "What is 2 + 2 * 5?", Mode::Auto);

        let count = synthesize_plan(&harness.context(&backend), &mut state).expect("plan");

        assert_eq!(count, 2);
        assert!(state.tasks().iter().all(|t| t.status == TaskStatus::Pending));
        assert_eq!(state.execution_log, vec!["Generated 2 tasks"]);
        assert!(harness.paths.stage_dir("run-1", "plan").join("meta.json").is_file());
    }

    #[test]
    fn non_consecutive_ids_are_a_planning_failure() {
        let harness = TestHarness::new();
        let backend = ScriptedBackend::new(vec![json!({"tasks": [
            {"id": 1, "title": "a", "description": ""},
            {"id": 3, "title": "b", "description": ""}
        ]})]);
        let mut state = RunState::new("run-1", "goal", Mode::Auto);

        let err = synthesize_plan(&harness.context(&backend), &mut state).unwrap_err();

        let failure = err.downcast_ref::<RunFailure>().expect("run failure");
        assert!(matches!(failure, RunFailure::Planning(msg) if msg.contains("1..=N")));
        assert!(state.tasks.is_none());
        assert!(state.execution_log.is_empty());
    }

    #[test]
    fn backend_error_is_a_planning_failure() {
        let harness = TestHarness::new();
        let backend = ScriptedBackend::failing("connection refused");
        let mut state = RunState::new("run-1", "goal", Mode::Confirm);

        let err = synthesize_plan(&harness.context(&backend), &mut state).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunFailure>(),
            Some(RunFailure::Planning(msg)) if msg.contains("connection refused")
        ));
    }

    #[test]
    fn replanning_is_refused() {
        let harness = TestHarness::new();
        let backend = ScriptedBackend::new(Vec::new());
        let mut state = RunState::new("run-1", "goal", Mode::Auto);
        state.tasks = Some(Vec::new());

        let err = synthesize_plan(&harness.context(&backend), &mut state).unwrap_err();
        assert!(err.downcast_ref::<RunFailure>().is_none());
        assert!(backend.requests().is_empty());
    }
}
