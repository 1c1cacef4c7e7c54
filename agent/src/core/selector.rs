//! Deterministic selection logic for the task list.

use crate::core::types::{Task, TaskStatus};

/// Find the earliest-created task with `status=pending`.
///
/// Returns `None` when the list is empty or every task has left `pending`.
pub fn first_pending(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().find(|task| task.status == TaskStatus::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{task, task_with_status};

    #[test]
    fn picks_first_pending_in_list_order() {
        let tasks = vec![
            task_with_status(1, TaskStatus::Complete),
            task_with_status(2, TaskStatus::Failed),
            task(3),
            task(4),
        ];
        assert_eq!(first_pending(&tasks).map(|t| t.id), Some(3));
    }

    #[test]
    fn skips_running_tasks() {
        let tasks = vec![task_with_status(1, TaskStatus::Running), task(2)];
        assert_eq!(first_pending(&tasks).map(|t| t.id), Some(2));
    }

    #[test]
    fn empty_and_terminal_lists_are_exhausted() {
        assert!(first_pending(&[]).is_none());
        let tasks = vec![
            task_with_status(1, TaskStatus::Complete),
            task_with_status(2, TaskStatus::Failed),
        ];
        assert!(first_pending(&tasks).is_none());
    }
}
