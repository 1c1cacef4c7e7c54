//! On-disk layout under `.agent/`.

use std::path::{Path, PathBuf};

/// Resolved locations for config, checkpoints, and stage artifacts.
#[derive(Debug, Clone)]
pub struct AgentPaths {
    root: PathBuf,
}

impl AgentPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root (the directory that holds `.agent/`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn agent_dir(&self) -> PathBuf {
        self.root.join(".agent")
    }

    pub fn config_path(&self) -> PathBuf {
        self.agent_dir().join("config.toml")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.agent_dir().join("runs")
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_dir().join(run_id)
    }

    pub fn run_state_path(&self, run_id: &str) -> PathBuf {
        self.run_dir(run_id).join("run_state.json")
    }

    /// Artifact directory for one backend call, e.g. `plan` or `task-3`.
    pub fn stage_dir(&self, run_id: &str, stage: &str) -> PathBuf {
        self.run_dir(run_id).join(stage)
    }

    /// Where output schemas are materialized for the backend.
    pub fn schemas_dir(&self) -> PathBuf {
        self.agent_dir().join("schemas")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_stable() {
        let paths = AgentPaths::new("/project");
        assert_eq!(paths.config_path(), Path::new("/project/.agent/config.toml"));
        assert_eq!(
            paths.run_state_path("run-1"),
            Path::new("/project/.agent/runs/run-1/run_state.json")
        );
        assert_eq!(
            paths.stage_dir("run-1", "task-2"),
            Path::new("/project/.agent/runs/run-1/task-2")
        );
    }
}
