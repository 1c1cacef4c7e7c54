//! Reasoning backend abstraction.
//!
//! The [`Backend`] trait decouples the stages from the reasoning service
//! (currently `codex exec`). Every call is a request/response exchange: a
//! prompt plus a JSON Schema in, one JSON document out. Tests use scripted
//! backends that write predetermined outputs without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_command;

/// Parameters for one backend call.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Working directory for the backend process.
    pub workdir: PathBuf,
    /// Prompt text.
    pub prompt: String,
    /// JSON Schema that constrains the reply.
    pub output_schema_path: PathBuf,
    /// Where the backend must write its JSON reply.
    pub output_path: PathBuf,
    /// Where to write the backend's stdout/stderr log.
    pub backend_log_path: PathBuf,
    /// Maximum time to wait for the reply.
    pub timeout: Duration,
    /// Truncate captured process output beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Optional JSONL event stream for live observation.
    pub stream_path: Option<PathBuf>,
}

/// Abstraction over reasoning backends.
pub trait Backend {
    /// Answer `request`. Must write the reply to `request.output_path`.
    fn exec(&self, request: &ExecRequest) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        (**self).exec(request)
    }
}

/// Backend that spawns `codex exec`.
#[derive(Debug, Clone)]
pub struct CodexBackend {
    program: String,
    reasoning_effort: String,
}

impl CodexBackend {
    pub fn new(program: impl Into<String>, reasoning_effort: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            reasoning_effort: reasoning_effort.into(),
        }
    }

    /// Confirm the backend CLI can be launched before a run starts.
    pub fn preflight(&self) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--version");
        let output = run_command(cmd, None, Duration::from_secs(30), 4_096, None)
            .with_context(|| format!("launch {} (is it installed and on PATH?)", self.program))?;
        if !output.status.success() {
            return Err(anyhow!(
                "{} --version failed with status {:?}",
                self.program,
                output.status.code()
            ));
        }
        debug!(version = %String::from_utf8_lossy(&output.stdout).trim(), "backend available");
        Ok(())
    }
}

impl Backend for CodexBackend {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs(), streaming = request.stream_path.is_some()))]
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        info!(workdir = %request.workdir.display(), "starting codex exec");

        if !request.output_schema_path.exists() {
            return Err(anyhow!(
                "missing output schema {}",
                request.output_schema_path.display()
            ));
        }
        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg("exec")
            .arg("-c")
            .arg(format!("model_reasoning_effort={}", self.reasoning_effort))
            // Capabilities own every side effect; the backend only reasons.
            .arg("--sandbox")
            .arg("read-only")
            .arg("--skip-git-repo-check");
        if request.stream_path.is_some() {
            cmd.arg("--json");
        }
        cmd.arg("--output-schema")
            .arg(&request.output_schema_path)
            .arg("--output-last-message")
            .arg(&request.output_path)
            .arg("-")
            .current_dir(&request.workdir);

        let output = run_command(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
            request.stream_path.as_deref(),
        )
        .context("run codex exec")?;

        write_backend_log(
            &request.backend_log_path,
            &output.render_log("backend"),
            request.output_limit_bytes,
        )?;

        if output.timed_out {
            warn!(
                timeout_secs = request.timeout.as_secs(),
                "codex exec timed out"
            );
            return Err(anyhow!("codex exec timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "codex exec failed");
            return Err(anyhow!(
                "codex exec failed with status {:?}",
                output.status.code()
            ));
        }

        debug!("codex exec completed successfully");
        Ok(())
    }
}

/// Run the backend, validate its reply against `schema`, and deserialize it.
///
/// Replies that break the schema are rejected, never coerced.
#[instrument(skip_all, fields(output_path = %request.output_path.display()))]
pub fn execute_and_load_validated<B: Backend, T: DeserializeOwned>(
    backend: &B,
    request: &ExecRequest,
    schema: &Value,
) -> Result<T> {
    backend.exec(request)?;
    let value = read_output_json(&request.output_path)?;
    validate_against_schema(schema, &value)?;
    let parsed = serde_json::from_value(value)
        .with_context(|| format!("deserialize {}", request.output_path.display()))?;
    Ok(parsed)
}

/// Validate a JSON instance against a JSON Schema.
pub fn validate_against_schema(schema: &Value, instance: &Value) -> Result<()> {
    let compiled = validator_for(schema).map_err(|err| anyhow!("invalid schema: {err}"))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "output schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn read_output_json(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(anyhow!("missing backend output {}", path.display()));
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read backend output {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_backend_log(path: &Path, body: &str, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create backend log dir {}", parent.display()))?;
    }
    let contents = if body.len() > output_limit {
        let mut cut = output_limit;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}\n[truncated {} bytes]\n", &body[..cut], body.len() - cut)
    } else {
        body.to_string()
    };
    fs::write(path, contents).with_context(|| format!("write backend log {}", path.display()))
}
