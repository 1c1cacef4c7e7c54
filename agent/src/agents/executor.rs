//! Executor agent: decide how to complete one task.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::types::{Task, TaskDecision};
use crate::io::backend::{Backend, ExecRequest, execute_and_load_validated};
use crate::io::prompt::PromptBuilder;
use crate::io::stage_log::{StagePaths, write_prompt};

use super::{AgentSettings, parse_schema, write_output_schema};

pub(crate) const TASK_DECISION_SCHEMA: &str =
    include_str!("../../schemas/task_decision.schema.json");

/// Everything the executor prompt shows about the run so far.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorInputs<'a> {
    pub goal: &'a str,
    pub task: &'a Task,
    /// Terminal tasks that precede `task`.
    pub earlier: &'a [Task],
    /// Rendered capability catalogue.
    pub capabilities: &'a str,
}

#[derive(Debug, Clone)]
pub struct ExecutorAgent {
    schema_path: PathBuf,
    settings: AgentSettings,
}

impl ExecutorAgent {
    pub fn new(schemas_dir: &Path, settings: AgentSettings) -> Self {
        Self {
            schema_path: schemas_dir.join("task_decision.schema.json"),
            settings,
        }
    }

    pub fn run<B: Backend>(
        &self,
        backend: &B,
        workdir: &Path,
        stage: &StagePaths,
        inputs: &ExecutorInputs<'_>,
    ) -> Result<TaskDecision> {
        write_output_schema(&self.schema_path, TASK_DECISION_SCHEMA)?;
        let schema = parse_schema("task_decision", TASK_DECISION_SCHEMA)?;

        let prompt = PromptBuilder::new(self.settings.prompt_budget_bytes).build_executor(
            inputs.goal,
            inputs.task,
            inputs.earlier,
            inputs.capabilities,
        )?;
        write_prompt(stage, &prompt)?;

        let request = ExecRequest {
            workdir: workdir.to_path_buf(),
            prompt,
            output_schema_path: self.schema_path.clone(),
            output_path: stage.output_path.clone(),
            backend_log_path: stage.backend_log_path.clone(),
            timeout: self.settings.stage_timeout,
            output_limit_bytes: self.settings.output_limit_bytes,
            stream_path: Some(stage.stream_path.clone()),
        };
        execute_and_load_validated(backend, &request, &schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DecisionAction, TaskStatus};
    use crate::test_support::{ScriptedBackend, agent_settings, task_with_status};
    use serde_json::json;

    #[test]
    fn executor_returns_typed_decision() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stage = StagePaths::create(temp.path().join("task-1")).expect("stage");
        let backend = ScriptedBackend::new(vec![json!({
            "action": "invoke",
            "capability": "add",
            "arguments": [{"name": "a", "value": 2}, {"name": "b", "value": 10}],
            "answer": null
        })]);
        let agent = ExecutorAgent::new(&temp.path().join("schemas"), agent_settings());
        let task = task_with_status(1, TaskStatus::Running);

        let decision = agent
            .run(
                &backend,
                temp.path(),
                &stage,
                &ExecutorInputs {
                    goal: "goal",
                    task: &task,
                    earlier: &[],
                    capabilities: "[]",
                },
            )
            .expect("decision");

        assert_eq!(decision.action, DecisionAction::Invoke);
        assert_eq!(decision.capability.as_deref(), Some("add"));
        assert_eq!(decision.arguments.len(), 2);
        assert!(backend.requests()[0].prompt.contains("Executor Contract"));
    }

    #[test]
    fn executor_rejects_unknown_action() {
        let temp = tempfile::tempdir().expect("tempdir");
        let stage = StagePaths::create(temp.path().join("task-1")).expect("stage");
        let backend = ScriptedBackend::new(vec![json!({
            "action": "delegate",
            "capability": null,
            "arguments": [],
            "answer": null
        })]);
        let agent = ExecutorAgent::new(&temp.path().join("schemas"), agent_settings());
        let task = task_with_status(1, TaskStatus::Running);

        let err = agent
            .run(
                &backend,
                temp.path(),
                &stage,
                &ExecutorInputs {
                    goal: "goal",
                    task: &task,
                    earlier: &[],
                    capabilities: "",
                },
            )
            .unwrap_err();
        assert!(err.to_string().contains("schema validation failed"));
    }
}
