//! Planner agent: goal to ordered task list.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::types::PlanOutput;
use crate::io::backend::{Backend, ExecRequest, execute_and_load_validated};
use crate::io::prompt::PromptBuilder;
use crate::io::stage_log::{StagePaths, write_prompt};

use super::{AgentSettings, parse_schema, write_output_schema};

pub(crate) const PLAN_OUTPUT_SCHEMA: &str = include_str!("../../schemas/plan_output.schema.json");

#[derive(Debug, Clone)]
pub struct PlannerAgent {
    schema_path: PathBuf,
    settings: AgentSettings,
}

impl PlannerAgent {
    pub fn new(schemas_dir: &Path, settings: AgentSettings) -> Self {
        Self {
            schema_path: schemas_dir.join("plan_output.schema.json"),
            settings,
        }
    }

    /// Ask the backend for a plan. The reply is schema-checked but ids are
    /// not yet validated; see [`PlanOutput::into_tasks`].
    pub fn run<B: Backend>(
        &self,
        backend: &B,
        workdir: &Path,
        stage: &StagePaths,
        goal: &str,
        capabilities: &str,
    ) -> Result<PlanOutput> {
        write_output_schema(&self.schema_path, PLAN_OUTPUT_SCHEMA)?;
        let schema = parse_schema("plan_output", PLAN_OUTPUT_SCHEMA)?;

        let prompt = PromptBuilder::new(self.settings.prompt_budget_bytes)
            .build_planner(goal, capabilities)?;
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
