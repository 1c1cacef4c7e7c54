//! Task execution stage: one decision, at most one capability call.

use std::time::Instant;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, info, warn};

use crate::agents::executor::{ExecutorAgent, ExecutorInputs};
use crate::capability::{Arguments, CapabilityRegistry, validate_arguments};
use crate::core::types::{Decision, RunState, TaskDecision, TaskStatus};
use crate::error::CapabilityError;
use crate::io::backend::Backend;
use crate::stage::{RunContext, record_stage};

/// Execute the current task and record its result.
///
/// Exactly one task changes status: `running` becomes `complete` or `failed`.
/// Task-level failures (bad decision, unknown capability, invalid arguments,
/// capability errors) are folded into the task result and never returned.
/// Errors are reserved for a missing or non-running current task and for
/// failures to prepare the stage directory.
pub fn execute_current_task<B: Backend>(
    ctx: &RunContext<'_, B>,
    state: &mut RunState,
) -> Result<TaskStatus> {
    let id = state
        .current_task_id
        .ok_or_else(|| anyhow!("run {} has no current task", state.run_id))?;
    let task = state
        .task(id)
        .ok_or_else(|| anyhow!("current task #{id} does not exist"))?
        .clone();
    if task.status != TaskStatus::Running {
        bail!("task #{id} is {}, expected running", task.status.as_str());
    }

    let stage_name = format!("task-{id}");
    let stage = ctx.stage_paths(&state.run_id, &stage_name)?;
    state.log(format!("Executing task #{id}: {}", task.title));
    let earlier: Vec<_> = state
        .tasks()
        .iter()
        .filter(|t| t.id != id && t.status.is_terminal())
        .cloned()
        .collect();

    let started = Instant::now();
    let decision = ctx.catalogue().and_then(|catalogue| {
        let agent = ExecutorAgent::new(&ctx.paths.schemas_dir(), ctx.settings);
        let inputs = ExecutorInputs {
            goal: &state.goal,
            task: &task,
            earlier: &earlier,
            capabilities: &catalogue,
        };
        agent
            .run(ctx.backend, ctx.workdir(), &stage, &inputs)
            .and_then(TaskDecision::into_decision)
    });
    record_stage(&stage, &state.run_id, &stage_name, Some(id), started, &decision);

    let outcome = match decision {
        Ok(Decision::Answer(text)) => {
            state.log(format!("Answered task #{id} directly"));
            Ok(text)
        }
        Ok(Decision::Invoke {
            capability,
            arguments,
        }) => dispatch(ctx.registry, state, &capability, &arguments),
        Err(err) => Err(CapabilityError::Decision(format!("{err:#}"))),
    };

    let status = match outcome {
        Ok(result) => {
            state.log(format!("Result: {result}"));
            finish(state, id, TaskStatus::Complete, result);
            info!(run_id = %state.run_id, task_id = id, "task complete");
            TaskStatus::Complete
        }
        Err(err) => {
            let rendered = err.to_descriptor().to_string();
            state.log(format!("Task #{id} failed: {rendered}"));
            finish(state, id, TaskStatus::Failed, rendered);
            warn!(run_id = %state.run_id, task_id = id, err = %err, "task failed");
            TaskStatus::Failed
        }
    };
    Ok(status)
}

/// Validate and invoke a capability. Nothing runs unless the arguments
/// match the declared parameters exactly.
fn dispatch(
    registry: &CapabilityRegistry,
    state: &mut RunState,
    name: &str,
    arguments: &Arguments,
) -> Result<String, CapabilityError> {
    let capability = registry
        .get(name)
        .ok_or_else(|| CapabilityError::Unknown(name.to_string()))?;

    let problems = validate_arguments(capability.parameters(), arguments);
    if !problems.is_empty() {
        return Err(CapabilityError::Argument {
            capability: name.to_string(),
            problems,
        });
    }

    debug!(capability = name, "invoking capability");
    let result = capability.invoke(arguments);
    state.log(format!(
        "Tool '{name}' executed with arguments {}",
        serde_json::Value::Object(arguments.clone())
    ));
    result.map_err(|failure| CapabilityError::Execution {
        capability: name.to_string(),
        failure,
    })
}

fn finish(state: &mut RunState, id: u32, status: TaskStatus, result: String) {
    if let Some(task) = state.task_mut(id) {
        task.status = status;
        task.result = Some(result);
    }
    state.current_task_id = None;
}
