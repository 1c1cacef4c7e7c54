//! Per-stage artifacts under `.agent/runs/<run_id>/<stage>/`.
//!
//! These are product artifacts, written regardless of `RUST_LOG`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// Files produced by one backend call.
#[derive(Debug, Clone)]
pub struct StagePaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub prompt_path: PathBuf,
    pub output_path: PathBuf,
    pub backend_log_path: PathBuf,
    pub stream_path: PathBuf,
}

impl StagePaths {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            meta_path: dir.join("meta.json"),
            prompt_path: dir.join("prompt.md"),
            output_path: dir.join("output.json"),
            backend_log_path: dir.join("backend.log"),
            stream_path: dir.join("stream.jsonl"),
            dir,
        }
    }

    pub fn create(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).with_context(|| format!("create stage dir {}", dir.display()))?;
        Ok(Self::new(dir))
    }
}

/// Summary of one stage, written as `meta.json`.
#[derive(Debug, Clone, Serialize)]
pub struct StageMeta {
    pub run_id: String,
    pub stage: String,
    pub task_id: Option<u32>,
    pub succeeded: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

pub fn write_prompt(paths: &StagePaths, prompt: &str) -> Result<()> {
    write_text(&paths.prompt_path, prompt)
}

pub fn write_meta(paths: &StagePaths, meta: &StageMeta) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(meta)?;
    buf.push('\n');
    write_text(&paths.meta_path, &buf)
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_paths_are_stable() {
        let paths = StagePaths::new(PathBuf::from("/p/.agent/runs/run-1/plan"));
        assert!(paths.meta_path.ends_with("plan/meta.json"));
        assert!(paths.prompt_path.ends_with("plan/prompt.md"));
        assert!(paths.output_path.ends_with("plan/output.json"));
        assert!(paths.backend_log_path.ends_with("plan/backend.log"));
    }

    #[test]
    fn writes_prompt_and_meta() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = StagePaths::create(temp.path().join("task-1")).expect("create");
        write_prompt(&paths, "prompt").expect("prompt");
        write_meta(
            &paths,
            &StageMeta {
                run_id: "run-1".to_string(),
                stage: "task-1".to_string(),
                task_id: Some(1),
                succeeded: false,
                error: Some("timed out".to_string()),
                duration_ms: 12,
            },
        )
        .expect("meta");

        let meta: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.meta_path).expect("read"))
                .expect("parse");
        assert_eq!(meta["task_id"], 1);
        assert_eq!(meta["error"], "timed out");
        assert_eq!(fs::read_to_string(&paths.prompt_path).expect("read"), "prompt");
    }
}
