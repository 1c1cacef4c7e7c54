//! Checkpoint storage for runs (`.agent/runs/<run_id>/run_state.json`).

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::types::RunState;
use crate::io::paths::AgentPaths;

/// Persists and restores [`RunState`] checkpoints.
#[derive(Debug, Clone)]
pub struct RunStore {
    paths: AgentPaths,
}

impl RunStore {
    pub fn new(paths: AgentPaths) -> Self {
        Self { paths }
    }


    /// Load the checkpoint for `run_id`.
    pub fn load(&self, run_id: &str) -> Result<RunState> {
        validate_run_id(run_id)?;
        let path = self.paths.run_state_path(run_id);
        if !path.exists() {
            return Err(anyhow!("unknown run '{run_id}' (no {})", path.display()));
        }
        load_run_state(&path)
    }

    /// Atomically write the checkpoint for `state.run_id`.
    pub fn save(&self, state: &RunState) -> Result<()> {
        validate_run_id(&state.run_id)?;
        write_run_state(&self.paths.run_state_path(&state.run_id), state)
    }

    /// Reserve a fresh run id and create its directory.
    pub fn allocate_run_id(&self) -> Result<String> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock before unix epoch")?
            .as_secs();
        let base = format!("run-{secs}");
        let runs_dir = self.paths.runs_dir();
        fs::create_dir_all(&runs_dir)
            .with_context(|| format!("create directory {}", runs_dir.display()))?;

        for suffix in 1..=999u32 {
            let id = if suffix == 1 {
                base.clone()
            } else {
                format!("{base}-{suffix}")
            };
            // create_dir fails if another run already claimed the id.
            match fs::create_dir(self.paths.run_dir(&id)) {
                Ok(()) => return Ok(id),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err).with_context(|| format!("create run dir for {id}"));
                }
            }
        }
        Err(anyhow!(
            "unable to allocate unique run id from base '{base}' (too many existing runs)"
        ))
    }
}

/// Run ids become directory names and must stay inside `runs/`.
pub fn validate_run_id(run_id: &str) -> Result<()> {
    let ok = !run_id.is_empty()
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        return Err(anyhow!(
            "invalid run id '{run_id}' (allowed: ASCII letters, digits, '-', '_')"
        ));
    }
    Ok(())
}

/// Load run state from disk.
pub fn load_run_state(path: &Path) -> Result<RunState> {
    debug!(path = %path.display(), "loading run state");
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run state {}", path.display()))?;
    let state: RunState = serde_json::from_str(&contents)
        .with_context(|| format!("parse run state {}", path.display()))?;
    debug!(run_id = %state.run_id, phase = %state.phase, "run state loaded");
    Ok(state)
}

/// Atomically write run state to disk (temp file + rename).
pub fn write_run_state(path: &Path, state: &RunState) -> Result<()> {
    debug!(path = %path.display(), run_id = %state.run_id, phase = %state.phase, "writing run state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Mode, Phase, TaskStatus};
    use crate::test_support::planned_state;

    #[test]
    fn run_state_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = RunStore::new(AgentPaths::new(temp.path()));

        let mut state = planned_state(Mode::Confirm, 2);
        state.log("Generated 2 tasks");
        if let Some(task) = state.task_mut(1) {
            task.status = TaskStatus::Failed;
            task.result = Some("error[arithmetic]: division by zero".to_string());
        }

        store.save(&state).expect("save");
        let loaded = store.load(&state.run_id).expect("load");
        assert_eq!(loaded, state);
        assert_eq!(loaded.phase, Phase::AwaitingApproval);
    }

    #[test]
    fn loading_unknown_run_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = RunStore::new(AgentPaths::new(temp.path()));
        let err = store.load("run-missing").unwrap_err();
        assert!(err.to_string().contains("unknown run 'run-missing'"));
    }

    #[test]
    fn rejects_path_like_run_ids() {
        assert!(validate_run_id("run-1_a").is_ok());
        for bad in ["", "../x", "a/b", "run 1"] {
            assert!(validate_run_id(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn allocated_ids_are_unique() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(temp.path());
        let store = RunStore::new(paths.clone());
        let first = store.allocate_run_id().expect("first");
        let second = store.allocate_run_id().expect("second");
        assert_ne!(first, second);
        assert!(paths.run_dir(&second).is_dir());
    }

    #[test]
    fn write_leaves_no_temp_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/run_state.json");
        write_atomic(&path, "{}\n").expect("write");
        assert!(path.is_file());
        assert!(!temp.path().join("nested/run_state.json.tmp").exists());
    }
}
