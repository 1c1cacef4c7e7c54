//! Wrappers around the three reasoning calls of a run.
//!
//! Each agent owns its output schema and prompt settings, renders its prompt
//! into the stage directory, and returns the schema-checked reply.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::NamedTempFile;

pub mod executor;
pub mod planner;
pub mod reflector;

/// Limits shared by every agent call.
#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub prompt_budget_bytes: usize,
    pub output_limit_bytes: usize,
    pub stage_timeout: Duration,
}

/// Materialize a bundled schema for the backend to read.
///
/// Runs under one root share these files, so an unchanged schema is left
/// alone and a changed one is swapped in by rename from a uniquely named
/// temp file. Readers see either the old or the new file, never a partial one.
pub(crate) fn write_output_schema(path: &Path, contents: &str) -> Result<()> {
    if fs::read_to_string(path).is_ok_and(|existing| existing == contents) {
        return Ok(());
    }
    let parent = path
        .parent()
        .with_context(|| format!("schema path missing parent {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("create schema dir {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp schema in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp schema {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replace schema {}", path.display()))?;
    Ok(())
}

pub(crate) fn parse_schema(name: &str, contents: &str) -> Result<Value> {
    serde_json::from_str(contents).with_context(|| format!("parse bundled schema {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn bundled_schemas_are_valid_json_schema() {
        for (name, contents) in [
            ("plan", planner::PLAN_OUTPUT_SCHEMA),
            ("decision", executor::TASK_DECISION_SCHEMA),
            ("reflection", reflector::REFLECTION_OUTPUT_SCHEMA),
        ] {
            let schema = parse_schema(name, contents).expect("parse");
            assert!(jsonschema::validator_for(&schema).is_ok(), "{name}");
        }
    }

    #[test]
    fn schema_write_skips_identical_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("schemas/plan_output.schema.json");

        write_output_schema(&path, planner::PLAN_OUTPUT_SCHEMA).expect("first write");
        let before = fs::metadata(&path).and_then(|m| m.modified()).expect("mtime");
        write_output_schema(&path, planner::PLAN_OUTPUT_SCHEMA).expect("second write");
        let after = fs::metadata(&path).and_then(|m| m.modified()).expect("mtime");

        assert_eq!(before, after);
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            planner::PLAN_OUTPUT_SCHEMA
        );
    }

    /// Readers racing a writer always see one complete schema.
    #[test]
    fn concurrent_schema_writes_are_never_torn() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("schemas/shared.schema.json");
        let versions = [
            planner::PLAN_OUTPUT_SCHEMA,
            reflector::REFLECTION_OUTPUT_SCHEMA,
        ];
        write_output_schema(&path, versions[0]).expect("seed");
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..500 {
                    write_output_schema(&path, versions[i % 2]).expect("write");
                }
                done.store(true, Ordering::SeqCst);
            });
            let mut reads = 0;
            while !done.load(Ordering::SeqCst) || reads < 500 {
                let contents = fs::read_to_string(&path).expect("read");
                assert!(
                    versions.contains(&contents.as_str()),
                    "torn read of {} bytes",
                    contents.len()
                );
                reads += 1;
            }
        });
    }
}
