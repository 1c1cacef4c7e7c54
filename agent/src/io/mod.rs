//! Side-effecting helpers: backend process, prompts, config, persistence.

pub mod backend;
pub mod config;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod run_store;
pub mod stage_log;
