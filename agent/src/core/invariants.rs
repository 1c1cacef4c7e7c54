//! Semantic invariants of a run that the type system does not capture.

use std::collections::HashSet;

use crate::core::types::{Mode, Phase, RunState, TaskStatus};

/// Check run-state invariants:
/// - task ids unique
/// - at most one task `running`, and only while executing
/// - `current_task_id` refers to an existing task
/// - tasks absent only while planning (or after a planning failure/cancel)
/// - `output` present exactly when the run is `Done`
/// - no task leaves `pending` before approval
pub fn validate_run_state(state: &RunState) -> Vec<String> {
    let mut errors = Vec::new();
    let tasks = state.tasks();

    let mut seen = HashSet::new();
    for task in tasks {
        if !seen.insert(task.id) {
            errors.push(format!("duplicate task id {}", task.id));
        }
    }

    let running: Vec<u32> = tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Running)
        .map(|task| task.id)
        .collect();
    if running.len() > 1 {
        errors.push(format!("multiple running tasks: {running:?}"));
    }
    if !running.is_empty() && state.phase != Phase::Executing {
        errors.push(format!(
            "task #{} is running outside the executing phase ({})",
            running[0], state.phase
        ));
    }

    if let Some(id) = state.current_task_id
        && state.task(id).is_none()
    {
        errors.push(format!("current_task_id {id} does not exist"));
    }

    if state.tasks.is_none()
        && !matches!(
            state.phase,
            Phase::Planning | Phase::Failed | Phase::Cancelled
        )
    {
        errors.push(format!("tasks are absent in phase {}", state.phase));
    }

    match (state.phase, state.output.is_some()) {
        (Phase::Done, false) => errors.push("run is done but output is missing".to_string()),
        (phase, true) if phase != Phase::Done => {
            errors.push(format!("output is set in phase {phase}"));
        }
        _ => {}
    }

    if state.mode == Mode::Auto && !state.approved {
        errors.push("auto run is not approved".to_string());
    }
    if !state.approved && tasks.iter().any(|task| task.status != TaskStatus::Pending) {
        errors.push("task left pending before approval".to_string());
    }

    errors
}
