//! Agent configuration stored under `.agent/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::capability::search::SearchSettings;

/// Agent configuration (TOML).
///
/// Edited by humans; every field is optional and falls back to the default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Wall-clock budget for a single backend call (plan, decision, reflection).
    pub stage_timeout_secs: u64,

    /// Truncate backend stdout/stderr logs beyond this many bytes.
    pub backend_output_limit_bytes: usize,

    /// Upper bound on rendered prompt size.
    pub prompt_budget_bytes: usize,

    /// Passed to the backend as `model_reasoning_effort`.
    pub reasoning_effort: String,

    /// Backend executable.
    pub backend_program: String,

    /// Root directory for the file capabilities, relative to the project root.
    pub workspace_dir: PathBuf,

    pub search: SearchSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: 10 * 60,
            backend_output_limit_bytes: 100_000,
            prompt_budget_bytes: 40_000,
            reasoning_effort: "medium".to_string(),
            backend_program: "codex".to_string(),
            workspace_dir: PathBuf::from("workspace"),
            search: SearchSettings::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stage_timeout_secs == 0 {
            return Err(anyhow!("stage_timeout_secs must be > 0"));
        }
        if self.backend_output_limit_bytes == 0 {
            return Err(anyhow!("backend_output_limit_bytes must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if !matches!(
            self.reasoning_effort.as_str(),
            "minimal" | "low" | "medium" | "high"
        ) {
            return Err(anyhow!(
                "reasoning_effort must be one of minimal, low, medium, high (got '{}')",
                self.reasoning_effort
            ));
        }
        if self.backend_program.trim().is_empty() {
            return Err(anyhow!("backend_program must be non-empty"));
        }
        if self.search.endpoint.trim().is_empty() {
            return Err(anyhow!("search.endpoint must be non-empty"));
        }
        if self.search.max_results == 0 {
            return Err(anyhow!("search.max_results must be > 0"));
        }
        if self.search.timeout_secs == 0 {
            return Err(anyhow!("search.timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
