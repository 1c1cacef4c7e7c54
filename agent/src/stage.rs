//! Shared plumbing for the plan, execute, and reflect stages.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::warn;

use crate::agents::AgentSettings;
use crate::capability::CapabilityRegistry;
use crate::io::backend::Backend;
use crate::io::paths::AgentPaths;
use crate::io::stage_log::{StageMeta, StagePaths, write_meta};

/// Collaborators a run needs. Borrowed so several runs can share them.
#[derive(Debug)]
pub struct RunContext<'a, B> {
    pub backend: &'a B,
    pub registry: &'a CapabilityRegistry,
    pub paths: &'a AgentPaths,
    pub settings: AgentSettings,
}

impl<B> Clone for RunContext<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for RunContext<'_, B> {}

impl<B: Backend> RunContext<'_, B> {
    /// Directory the backend runs in.
    pub fn workdir(&self) -> &Path {
        self.paths.root()
    }

    /// Capability catalogue as shown to the backend; empty if none are registered.
    pub fn catalogue(&self) -> Result<String> {
        if self.registry.is_empty() {
            return Ok(String::new());
        }
        serde_json::to_string_pretty(&self.registry.to_schema_json())
            .context("serialize capability catalogue")
    }

    pub fn stage_paths(&self, run_id: &str, stage: &str) -> Result<StagePaths> {
        StagePaths::create(self.paths.stage_dir(run_id, stage))
    }
}

/// Write `meta.json` for a finished stage. A failure to write is logged, not
/// returned, so it cannot mask the stage's own result.
pub(crate) fn record_stage<T>(
    stage: &StagePaths,
    run_id: &str,
    name: &str,
    task_id: Option<u32>,
    started: Instant,
    result: &Result<T>,
) {
    let meta = StageMeta {
        run_id: run_id.to_string(),
        stage: name.to_string(),
        task_id,
        succeeded: result.is_ok(),
        error: result.as_ref().err().map(|err| format!("{err:#}")),
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    if let Err(err) = write_meta(stage, &meta) {
        warn!(err = %err, stage = name, "failed to write stage meta");
    }
}
