//! Task selection stage.

use anyhow::{Result, bail};
use tracing::debug;

use crate::core::selector::first_pending;
use crate::core::types::{RunState, TaskStatus};

/// Outcome of one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// This task is now `running` and current.
    Selected(u32),
    /// Nothing is pending; move on to reflection.
    Exhausted,
}

/// Mark the first pending task `running` and make it current.
///
/// Repeated calls on an exhausted run keep returning `Exhausted` and log
/// nothing. Selecting before approval, or while another task is running, is
/// an error.
pub fn select_next_task(state: &mut RunState) -> Result<Selection> {
    if !state.approved {
        bail!("run {} is not approved; no task may start", state.run_id);
    }
    if let Some(running) = state
        .tasks()
        .iter()
        .find(|task| task.status == TaskStatus::Running)
    {
        bail!("task #{} is still running", running.id);
    }

    let Some(next) = first_pending(state.tasks()) else {
        state.current_task_id = None;
        debug!(run_id = %state.run_id, "no pending tasks");
        return Ok(Selection::Exhausted);
    };
    let id = next.id;
    let line = format!("Selected task #{}: {}", next.id, next.title);

    if let Some(task) = state.task_mut(id) {
        task.status = TaskStatus::Running;
    }
    state.current_task_id = Some(id);
    state.log(line);
    debug!(run_id = %state.run_id, task_id = id, "task selected");
    Ok(Selection::Selected(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Mode;
    use crate::test_support::planned_state;

    #[test]
    fn selects_in_list_order_and_logs() {
        let mut state = planned_state(Mode::Auto, 2);

        assert_eq!(select_next_task(&mut state).expect("select"), Selection::Selected(1));
        assert_eq!(state.current_task_id, Some(1));
        assert_eq!(state.task(1).map(|t| t.status), Some(TaskStatus::Running));
        assert_eq!(state.execution_log.last().map(String::as_str), Some("Selected task #1: Task 1"));
    }

    #[test]
    fn exhausted_is_idempotent_and_silent() {
        let mut state = planned_state(Mode::Auto, 0);
        let before = state.execution_log.clone();
        for _ in 0..3 {
            assert_eq!(select_next_task(&mut state).expect("select"), Selection::Exhausted);
        }
        assert_eq!(state.execution_log, before);
        assert_eq!(state.current_task_id, None);
    }

    #[test]
    fn refuses_before_approval() {
        let mut state = planned_state(Mode::Confirm, 1);
        assert!(select_next_task(&mut state).is_err());
        assert_eq!(state.task(1).map(|t| t.status), Some(TaskStatus::Pending));
    }

    #[test]
    fn refuses_while_a_task_runs() {
        let mut state = planned_state(Mode::Auto, 2);
        select_next_task(&mut state).expect("first");
        let err = select_next_task(&mut state).unwrap_err();
        assert!(err.to_string().contains("still running"));
    }
}
