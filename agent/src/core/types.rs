//! Shared deterministic types for the orchestration core.
//!
//! These types define the contract between stages. They carry no I/O and
//! serialize to the checkpoint format persisted at the approval gate.

use std::fmt;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

/// How the run treats the approval gate between planning and execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Pre-approved; execution starts as soon as the plan exists.
    Auto,
    /// Suspends after planning until an external approve/reject signal.
    Confirm,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Confirm => "confirm",
        }
    }
}

/// Lifecycle of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Complete => "complete",
            TaskStatus::Failed => "failed",
        }
    }
}

/// One step of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub result: Option<String>,
}

impl Task {
    /// Create a fresh pending task with no result.
    pub fn pending(id: u32, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            result: None,
        }
    }
}

/// Position of a run in the orchestration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    AwaitingApproval,
    Selecting,
    Executing,
    Reflecting,
    Done,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed | Phase::Cancelled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Planning => "planning",
            Phase::AwaitingApproval => "awaiting_approval",
            Phase::Selecting => "selecting",
            Phase::Executing => "executing",
            Phase::Reflecting => "reflecting",
            Phase::Done => "done",
            Phase::Failed => "failed",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// The single mutable record threaded through a run.
///
/// Fields are public for serialization and inspection; stage code mutates
/// through the methods below so the append-only and set-once rules hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub goal: String,
    pub mode: Mode,
    pub phase: Phase,
    pub tasks: Option<Vec<Task>>,
    pub current_task_id: Option<u32>,
    pub approved: bool,
    pub execution_log: Vec<String>,
    pub output: Option<String>,
    pub failure: Option<String>,
}

impl RunState {
    /// Create the initial state for a run. `auto` runs start approved.
    pub fn new(run_id: impl Into<String>, goal: impl Into<String>, mode: Mode) -> Self {
        Self {
            run_id: run_id.into(),
            goal: goal.into(),
            mode,
            phase: Phase::Planning,
            tasks: None,
            current_task_id: None,
            approved: mode == Mode::Auto,
            execution_log: Vec::new(),
            output: None,
            failure: None,
        }
    }

    /// Append a line to the execution log.
    pub fn log(&mut self, line: impl Into<String>) {
        self.execution_log.push(line.into());
    }

    /// Tasks in creation order; empty before planning.
    pub fn tasks(&self) -> &[Task] {
        self.tasks.as_deref().unwrap_or(&[])
    }

    pub fn task(&self, id: u32) -> Option<&Task> {
        self.tasks().iter().find(|task| task.id == id)
    }

    pub fn task_mut(&mut self, id: u32) -> Option<&mut Task> {
        self.tasks
            .as_mut()
            .and_then(|tasks| tasks.iter_mut().find(|task| task.id == id))
    }

    /// Flip the gate. Only valid once, and only for `confirm` runs.
    pub fn approve(&mut self) -> Result<()> {
        if self.mode != Mode::Confirm {
            bail!("run {} is in auto mode and needs no approval", self.run_id);
        }
        if self.approved {
            bail!("run {} is already approved", self.run_id);
        }
        self.approved = true;
        Ok(())
    }

    /// Record the synthesized answer. Refuses to overwrite.
    pub fn set_output(&mut self, output: impl Into<String>) -> Result<()> {
        if self.output.is_some() {
            return Err(anyhow!("output for run {} is already set", self.run_id));
        }
        self.output = Some(output.into());
        Ok(())
    }

    /// Count tasks with the given status.
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks()
            .iter()
            .filter(|task| task.status == status)
            .count()
    }
}

/// Planner reply (`plan_output.schema.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanOutput {
    pub tasks: Vec<PlannedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub id: u32,
    pub title: String,
    pub description: String,
}

impl PlanOutput {
    /// Convert to pending tasks. Ids must be exactly `1..=N` in order.
    pub fn into_tasks(self) -> Result<Vec<Task>> {
        self.tasks
            .into_iter()
            .enumerate()
            .map(|(idx, planned)| {
                let expected = u32::try_from(idx + 1)?;
                if planned.id != expected {
                    bail!(
                        "task ids must run 1..=N in order: position {} has id {}",
                        expected,
                        planned.id
                    );
                }
                Ok(Task::pending(planned.id, planned.title, planned.description))
            })
            .collect()
    }
}

/// Executor reply (`task_decision.schema.json`) before interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDecision {
    pub action: DecisionAction,
    pub capability: Option<String>,
    pub arguments: Vec<DecisionArgument>,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Invoke,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionArgument {
    pub name: String,
    pub value: serde_json::Value,
}

/// What the executor does with the current task.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Invoke {
        capability: String,
        arguments: serde_json::Map<String, serde_json::Value>,
    },
    Answer(String),
}

impl TaskDecision {
    /// Interpret the reply. Fails on a missing capability or answer and on
    /// repeated argument names.
    pub fn into_decision(self) -> Result<Decision> {
        match self.action {
            DecisionAction::Answer => {
                let answer = self
                    .answer
                    .ok_or_else(|| anyhow!("action 'answer' requires a non-null answer"))?;
                Ok(Decision::Answer(answer))
            }
            DecisionAction::Invoke => {
                let capability = self
                    .capability
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| anyhow!("action 'invoke' requires a capability name"))?;
                let mut arguments = serde_json::Map::new();
                for arg in self.arguments {
                    if arguments.contains_key(&arg.name) {
                        bail!("argument '{}' given more than once", arg.name);
                    }
                    arguments.insert(arg.name, arg.value);
                }
                Ok(Decision::Invoke {
                    capability,
                    arguments,
                })
            }
        }
    }
}

/// Reflector reply (`reflection_output.schema.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionOutput {
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_runs_start_approved_and_confirm_runs_do_not() {
        let auto = RunState::new("r1", "goal", Mode::Auto);
        assert!(auto.approved);
        assert_eq!(auto.phase, Phase::Planning);

        let confirm = RunState::new("r2", "goal", Mode::Confirm);
        assert!(!confirm.approved);
    }

    #[test]
    fn approve_flips_once_for_confirm_runs() {
        let mut state = RunState::new("r1", "goal", Mode::Confirm);
        state.approve().expect("first approve");
        assert!(state.approved);
        let err = state.approve().unwrap_err();
        assert!(err.to_string().contains("already approved"));

        let mut auto = RunState::new("r2", "goal", Mode::Auto);
        assert!(auto.approve().is_err());
    }

    #[test]
    fn output_is_set_at_most_once() {
        let mut state = RunState::new("r1", "goal", Mode::Auto);
        state.set_output("first").expect("set");
        assert!(state.set_output("second").is_err());
        assert_eq!(state.output.as_deref(), Some("first"));
    }

    #[test]
    fn serialized_enums_use_lowercase_names() {
        let task = Task::pending(1, "t", "d");
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["status"], "pending");

        let state = RunState::new("r1", "goal", Mode::Confirm);
        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["mode"], "confirm");
        assert_eq!(json["phase"], "planning");
        assert!(json["tasks"].is_null());
    }

    #[test]
    fn plan_ids_must_be_consecutive_from_one() {
        let plan = |ids: &[u32]| PlanOutput {
            tasks: ids
                .iter()
                .map(|id| PlannedTask {
                    id: *id,
                    title: format!("t{id}"),
                    description: String::new(),
                })
                .collect(),
        };

        let tasks = plan(&[1, 2, 3]).into_tasks().expect("valid");
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending && t.result.is_none()));

        assert!(plan(&[]).into_tasks().expect("empty").is_empty());
        assert!(plan(&[1, 3]).into_tasks().is_err());
        assert!(plan(&[2, 1]).into_tasks().is_err());
        assert!(plan(&[1, 1]).into_tasks().is_err());
    }

    #[test]
    fn invoke_decision_collects_arguments() {
        let decision: TaskDecision = serde_json::from_value(serde_json::json!({
            "action": "invoke",
            "capability": "multiply",
            "arguments": [{"name": "a", "value": 2}, {"name": "b", "value": 5}],
            "answer": null
        }))
        .expect("parse");

        match decision.into_decision().expect("decision") {
            Decision::Invoke {
                capability,
                arguments,
            } => {
                assert_eq!(capability, "multiply");
                assert_eq!(arguments["a"], 2);
                assert_eq!(arguments["b"], 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_decisions_are_rejected() {
        let answer_without_text = TaskDecision {
            action: DecisionAction::Answer,
            capability: None,
            arguments: Vec::new(),
            answer: None,
        };
        assert!(answer_without_text.into_decision().is_err());

        let invoke_without_name = TaskDecision {
            action: DecisionAction::Invoke,
            capability: Some("  ".to_string()),
            arguments: Vec::new(),
            answer: None,
        };
        assert!(invoke_without_name.into_decision().is_err());

        let repeated = TaskDecision {
            action: DecisionAction::Invoke,
            capability: Some("add".to_string()),
            arguments: vec![
                DecisionArgument {
                    name: "a".to_string(),
                    value: serde_json::json!(1),
                },
                DecisionArgument {
                    name: "a".to_string(),
                    value: serde_json::json!(2),
                },
            ],
            answer: None,
        };
        let err = repeated.into_decision().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
