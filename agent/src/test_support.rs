//! Helpers for unit and integration tests: task builders, a scripted
//! backend, and a temp-dir harness with a ready capability registry.

use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::Value;
use tempfile::TempDir;

use crate::agents::AgentSettings;
use crate::capability::{
    Arguments, Capability, CapabilityRegistry, FailureDescriptor, ParamSpec, ParamType,
    arithmetic,
};
use crate::core::types::{Mode, Phase, RunState, Task, TaskStatus};
use crate::io::backend::{Backend, ExecRequest};
use crate::io::paths::AgentPaths;
use crate::stage::RunContext;

/// Pending task `id` titled `Task {id}`.
pub fn task(id: u32) -> Task {
    Task::pending(id, format!("Task {id}"), format!("Do step {id}"))
}

pub fn task_with_status(id: u32, status: TaskStatus) -> Task {
    Task {
        status,
        ..task(id)
    }
}

/// A run with `n` pending tasks, parked where the orchestrator leaves it
/// after planning: at the gate for confirm runs, selecting for auto runs.
pub fn planned_state(mode: Mode, n: u32) -> RunState {
    let mut state = RunState::new("run-test", "test goal", mode);
    state.tasks = Some((1..=n).map(task).collect());
    state.phase = match mode {
        Mode::Auto => Phase::Selecting,
        Mode::Confirm => Phase::AwaitingApproval,
    };
    state.log(format!("Generated {n} tasks"));
    state
}

pub fn agent_settings() -> AgentSettings {
    AgentSettings {
        prompt_budget_bytes: 40_000,
        output_limit_bytes: 100_000,
        stage_timeout: Duration::from_secs(30),
    }
}

const ECHO_PARAMS: &[ParamSpec] = &[ParamSpec::new("text", ParamType::String, "Text to echo.")];

/// Returns its `text` argument and counts invocations.
#[derive(Debug, Clone, Default)]
pub struct EchoCapability {
    calls: Arc<AtomicUsize>,
}

impl EchoCapability {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Capability for EchoCapability {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns the given text unchanged."
    }

    fn parameters(&self) -> &[ParamSpec] {
        ECHO_PARAMS
    }

    fn invoke(&self, args: &Arguments) -> Result<String, FailureDescriptor> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(args
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

/// One scripted backend reply.
#[derive(Debug, Clone)]
pub enum Step {
    /// Write this JSON as the reply.
    Reply(Value),
    /// Fail the call with this message.
    Fail(String),
}

/// Backend that replays a fixed script and records every request.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ExecRequest>>,
}

impl ScriptedBackend {
    /// Reply with each value in order.
    pub fn new(replies: Vec<Value>) -> Self {
        Self::with_steps(replies.into_iter().map(Step::Reply).collect())
    }

    /// Fail every call with `message`.
    pub fn failing(message: &str) -> Self {
        Self::with_steps(vec![Step::Fail(message.to_string()); 8])
    }

    pub fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        lock(&self.requests).clone()
    }

    /// Panics if any scripted step was not consumed.
    pub fn assert_drained(&self) {
        let remaining = lock(&self.steps).len();
        assert_eq!(remaining, 0, "{remaining} scripted backend steps unused");
    }
}

impl Backend for ScriptedBackend {
    fn exec(&self, request: &ExecRequest) -> Result<()> {
        lock(&self.requests).push(request.clone());
        let step = lock(&self.steps)
            .pop_front()
            .ok_or_else(|| anyhow!("scripted backend has no reply left"))?;
        match step {
            Step::Reply(value) => {
                if let Some(parent) = request.output_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut buf = serde_json::to_string_pretty(&value)?;
                buf.push('\n');
                fs::write(&request.output_path, buf)?;
                Ok(())
            }
            Step::Fail(message) => Err(anyhow!(message)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Temp project root with arithmetic capabilities and a counting `echo`.
#[derive(Debug)]
pub struct TestHarness {
    pub dir: TempDir,
    pub paths: AgentPaths,
    pub registry: CapabilityRegistry,
    echo: EchoCapability,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AgentPaths::new(dir.path());
        let echo = EchoCapability::default();
        let mut registry = CapabilityRegistry::new();
        arithmetic::register_all(&mut registry);
        registry.register(echo.clone());
        Self {
            dir,
            paths,
            registry,
            echo,
        }
    }

    pub fn context<'a, B: Backend>(&'a self, backend: &'a B) -> RunContext<'a, B> {
        RunContext {
            backend,
            registry: &self.registry,
            paths: &self.paths,
            settings: agent_settings(),
        }
    }

    pub fn echo_calls(&self) -> usize {
        self.echo.calls()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
