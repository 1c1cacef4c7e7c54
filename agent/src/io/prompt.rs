//! Prompt rendering for the planner, executor, and reflector calls.
//!
//! Templates mark their sections with `<!-- section:KEY required|droppable -->`.
//! When a rendered prompt exceeds the byte budget, droppable sections go first
//! (execution log, then earlier results, then the planner's capability list)
//! and the last remaining section is truncated as a final resort.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use tracing::debug;

use crate::core::types::Task;

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const EXECUTOR_TEMPLATE: &str = include_str!("prompts/executor.md");
const REFLECTOR_TEMPLATE: &str = include_str!("prompts/reflector.md");

const DROP_ORDER: [&str; 3] = ["log", "results", "capabilities"];
const TRUNCATION_NOTICE: &str = "\n[truncated]";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .expect("section marker regex should compile")
});

struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .context("load planner template")?;
        env.add_template("executor", EXECUTOR_TEMPLATE)
            .context("load executor template")?;
        env.add_template("reflector", REFLECTOR_TEMPLATE)
            .context("load reflector template")?;
        Ok(Self { env })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        template
            .render(ctx)
            .with_context(|| format!("render {name} template"))
    }
}

#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    content: String,
}

fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let markers: Vec<(usize, usize, String, bool)> = SECTION_RE
        .captures_iter(rendered)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let key = caps.get(1)?.as_str().to_string();
            let required = caps.get(2)?.as_str() == "required";
            Some((whole.start(), whole.end(), key, required))
        })
        .collect();

    let mut sections = Vec::new();
    for (i, (_, body_start, key, required)) in markers.iter().enumerate() {
        let body_end = markers
            .get(i + 1)
            .map(|(start, ..)| *start)
            .unwrap_or(rendered.len());
        let content = rendered[*body_start..body_end].trim().to_string();
        if !content.is_empty() || *required {
            sections.push(ParsedSection {
                key: key.clone(),
                required: *required,
                content,
            });
        }
    }
    sections
}

const SEPARATOR: &str = "\n\n";

/// Length of the prompt `render_sections` would produce.
fn total_len(sections: &[ParsedSection]) -> usize {
    let bodies: usize = sections.iter().map(|s| s.content.len()).sum();
    bodies + SEPARATOR.len() * sections.len().saturating_sub(1)
}

fn apply_budget(sections: &mut Vec<ParsedSection>, budget: usize) {
    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    if total_len(sections) <= budget {
        return;
    }
    let last_len = sections.last().map_or(0, |s| s.content.len());
    let allowed = budget.saturating_sub(total_len(sections) - last_len);
    if let Some(last) = sections.last_mut() {
        let before_len = last.content.len();
        if allowed > TRUNCATION_NOTICE.len() {
            truncate_at_char_boundary(&mut last.content, allowed - TRUNCATION_NOTICE.len());
            last.content.push_str(TRUNCATION_NOTICE);
        } else {
            truncate_at_char_boundary(&mut last.content, allowed);
        }
        debug!(
            section = %last.key,
            before_len,
            after_len = last.content.len(),
            "truncated section for budget"
        );
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Renders prompts within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Prompt for decomposing `goal` into tasks. `capabilities` is the
    /// rendered catalogue, or empty when no capability is registered.
    pub fn build_planner(&self, goal: &str, capabilities: &str) -> Result<String> {
        let capabilities = capabilities.trim();
        self.build(
            "planner",
            context! {
                goal => goal.trim(),
                capabilities => (!capabilities.is_empty()).then_some(capabilities),
            },
        )
    }

    /// Prompt for deciding how to complete `task`.
    pub fn build_executor(
        &self,
        goal: &str,
        task: &Task,
        earlier: &[Task],
        capabilities: &str,
    ) -> Result<String> {
        let capabilities = capabilities.trim();
        self.build(
            "executor",
            context! {
                goal => goal.trim(),
                task => task,
                earlier => earlier,
                capabilities => (!capabilities.is_empty()).then_some(capabilities),
            },
        )
    }

    /// Prompt for the final answer from every task's outcome and the log.
    pub fn build_reflector(&self, goal: &str, tasks: &[Task], log: &[String]) -> Result<String> {
        self.build(
            "reflector",
            context! {
                goal => goal.trim(),
                tasks => tasks,
                log => log,
            },
        )
    }

    fn build(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let rendered = PromptEngine::new()?.render(name, ctx)?;
        let mut sections = parse_sections(&rendered);
        apply_budget(&mut sections, self.budget_bytes);
        Ok(render_sections(&sections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaskStatus;
    use crate::test_support::task_with_status;

    fn position(content: &str, needle: &str) -> usize {
        content
            .find(needle)
            .unwrap_or_else(|| panic!("missing {needle} in:\n{content}"))
    }

    /// Contract first, then goal, task, capabilities, earlier results.
    #[test]
    fn executor_sections_are_ordered() {
        let mut earlier = task_with_status(1, TaskStatus::Complete);
        earlier.result = Some("10".to_string());
        let current = task_with_status(2, TaskStatus::Running);

        let content = PromptBuilder::new(10_000)
            .build_executor("compute", &current, &[earlier], "[{\"name\": \"add\"}]")
            .expect("render");

        let contract = position(&content, "### Executor Contract");
        let goal = position(&content, "### Goal");
        let task = position(&content, "### Current Task");
        let caps = position(&content, "### Available Capabilities");
        let results = position(&content, "### Earlier Results");
        assert!(contract < goal && goal < task && task < caps && caps < results);
        assert!(content.contains("#1 Task 1 [complete]: 10"));
        assert!(content.contains("<task>\n#2: Task 2"));
    }

    #[test]
    fn executor_without_capabilities_says_so() {
        let current = task_with_status(1, TaskStatus::Running);
        let content = PromptBuilder::new(10_000)
            .build_executor("compute", &current, &[], "")
            .expect("render");
        assert!(content.contains("None. Answer directly."));
        assert!(!content.contains("### Earlier Results"));
    }

    #[test]
    fn planner_wraps_goal_in_tags() {
        let content = PromptBuilder::new(10_000)
            .build_planner("What is 2 + 2 * 5?", "")
            .expect("render");
        assert!(content.contains("<goal>\nWhat is 2 + 2 * 5?\n</goal>"));
        assert!(content.contains("<contract>"));
        assert!(!content.contains("### Available Capabilities"));
    }

    #[test]
    fn reflector_with_zero_tasks_asks_for_direct_answer() {
        let content = PromptBuilder::new(10_000)
            .build_reflector("Say hi", &[], &[])
            .expect("render");
        assert!(content.contains("No tasks were planned"));
        assert!(!content.contains("### Task Results"));
        assert!(!content.contains("### Execution Log"));
    }

    /// Under a tight budget the log is dropped before any required section.
    #[test]
    fn budget_drops_log_first() {
        let mut tasks = vec![task_with_status(1, TaskStatus::Complete)];
        tasks[0].result = Some("12".to_string());
        let log: Vec<String> = (0..200).map(|i| format!("log line {i}")).collect();

        let content = PromptBuilder::new(900)
            .build_reflector("compute", &tasks, &log)
            .expect("render");

        assert!(!content.contains("### Execution Log"));
        assert!(content.contains("### Reflector Contract"));
        assert!(content.contains("### Goal"));
        assert!(content.contains("### Task Results"));
        assert!(content.len() <= 900);
    }

    #[test]
    fn budget_truncates_when_dropping_is_not_enough() {
        let mut tasks = vec![task_with_status(1, TaskStatus::Complete)];
        tasks[0].result = Some("x".repeat(5_000));

        let content = PromptBuilder::new(1_000)
            .build_reflector("compute", &tasks, &[])
            .expect("render");

        assert!(content.len() <= 1_000);
        assert!(content.contains("### Task Results"));
        assert!(content.ends_with("[truncated]"));
    }
}
