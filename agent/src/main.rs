//! Plan-and-execute task agent CLI.
//!
//! `todo-agent run` plans a goal, and in `auto` mode executes and reflects
//! straight away. In `confirm` mode the run stops at the approval gate and is
//! continued with `approve` or cancelled with `reject`. Runs are stored under
//! `.agent/runs/<run_id>/`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use todo_agent::agents::AgentSettings;
use todo_agent::capability::{BuiltinSettings, builtin_registry};
use todo_agent::core::types::{Mode, RunState};
use todo_agent::exit_codes;
use todo_agent::io::backend::CodexBackend;
use todo_agent::io::config::{AgentConfig, load_config};
use todo_agent::io::paths::AgentPaths;
use todo_agent::io::run_store::RunStore;
use todo_agent::orchestrator::{Orchestrator, RunOutcome, RunReport};
use todo_agent::stage::RunContext;

#[derive(Parser)]
#[command(
    name = "todo-agent",
    version,
    about = "Plan a goal into tasks, execute them with tools, and synthesize an answer"
)]
struct Cli {
    /// Project directory that holds `.agent/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a goal and, in auto mode, execute it to completion.
    Run {
        /// What the agent should accomplish.
        #[arg(long)]
        goal: String,
        /// `confirm` stops after planning until `approve` or `reject`.
        #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
        mode: ModeArg,
    },
    /// Approve a planned run and execute it.
    Approve { run_id: String },
    /// Cancel a planned run without executing anything.
    Reject { run_id: String },
    /// Print the stored state of a run as JSON.
    Show { run_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Auto,
    Confirm,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Auto => Mode::Auto,
            ModeArg::Confirm => Mode::Confirm,
        }
    }
}

fn main() {
    todo_agent::logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    // Credentials such as TAVILY_API_KEY may live in `.env`.
    dotenv::dotenv().ok();

    let paths = AgentPaths::new(&cli.root);
    match cli.command {
        Command::Show { run_id } => cmd_show(&paths, &run_id),
        Command::Run { goal, mode } => with_orchestrator(&paths, |orchestrator, backend| {
            backend.preflight()?;
            orchestrator.start(&goal, mode.into())
        }),
        Command::Approve { run_id } => with_orchestrator(&paths, |orchestrator, backend| {
            backend.preflight()?;
            orchestrator.approve(&run_id)
        }),
        Command::Reject { run_id } => {
            with_orchestrator(&paths, |orchestrator, _| orchestrator.reject(&run_id))
        }
    }
}

/// Build the backend, registry, and orchestrator from config, run `f`, and
/// report its outcome.
fn with_orchestrator(
    paths: &AgentPaths,
    f: impl FnOnce(&Orchestrator<'_, CodexBackend>, &CodexBackend) -> Result<RunReport>,
) -> Result<i32> {
    let config = load_config(&paths.config_path())?;
    let backend = CodexBackend::new(&config.backend_program, &config.reasoning_effort);
    let workspace_dir = paths.root().join(&config.workspace_dir);
    fs::create_dir_all(&workspace_dir)
        .with_context(|| format!("create workspace {}", workspace_dir.display()))?;
    let registry = builtin_registry(&BuiltinSettings {
        workspace_dir,
        search: config.search.clone(),
    });
    let orchestrator = Orchestrator::new(RunContext {
        backend: &backend,
        registry: &registry,
        paths,
        settings: agent_settings(&config),
    });

    let report = f(&orchestrator, &backend)?;
    Ok(print_report(&report))
}

fn agent_settings(config: &AgentConfig) -> AgentSettings {
    AgentSettings {
        prompt_budget_bytes: config.prompt_budget_bytes,
        output_limit_bytes: config.backend_output_limit_bytes,
        stage_timeout: Duration::from_secs(config.stage_timeout_secs),
    }
}

fn cmd_show(paths: &AgentPaths, run_id: &str) -> Result<i32> {
    let state = RunStore::new(paths.clone()).load(run_id)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&state).context("serialize run state")?
    );
    Ok(exit_codes::OK)
}

/// Print the outcome and return the matching exit code.
fn print_report(report: &RunReport) -> i32 {
    let run_id = report.run_id();
    match &report.outcome {
        RunOutcome::Done { output } => {
            print_log(&report.state);
            println!("{output}");
            exit_codes::OK
        }
        RunOutcome::AwaitingApproval => {
            println!("Plan for run {run_id}:");
            for task in report.state.tasks() {
                println!("  {}. {}: {}", task.id, task.title, task.description);
            }
            println!(
                "Approve with `todo-agent approve {run_id}` or cancel with `todo-agent reject {run_id}`."
            );
            exit_codes::AWAITING_APPROVAL
        }
        RunOutcome::Failed { failure } => {
            print_log(&report.state);
            eprintln!("run {run_id} failed: {failure}");
            exit_codes::FAILED
        }
        RunOutcome::Cancelled => {
            eprintln!("run {run_id} cancelled");
            exit_codes::CANCELLED
        }
    }
}

fn print_log(state: &RunState) {
    for line in &state.execution_log {
        eprintln!("{line}");
    }
}
