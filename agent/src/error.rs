//! Failure taxonomy for runs and tasks.
//!
//! Run-level failures end a run in `Failed` and reach the caller through
//! [`crate::orchestrator::RunOutcome::Failed`]. Task-level failures are folded
//! into the failed task's `result` and never leave the executor.

use thiserror::Error;

use crate::capability::{FailureCategory, FailureDescriptor};

/// Fatal failure of a whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    /// The backend was unreachable or its plan did not conform to the schema.
    #[error("planning failed: {0}")]
    Planning(String),
    /// The backend failed while synthesizing the final answer.
    #[error("reflection failed: {0}")]
    Reflection(String),
}

/// Non-fatal failure of a single task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    /// No capability with this name is registered.
    #[error("unknown capability '{0}'")]
    Unknown(String),
    /// The arguments break the capability's parameter schema.
    #[error("invalid call to '{capability}': {}", .problems.join("; "))]
    Argument {
        capability: String,
        problems: Vec<String>,
    },
    /// The capability ran and reported a failure.
    #[error("'{capability}' failed: {}", .failure.message)]
    Execution {
        capability: String,
        failure: FailureDescriptor,
    },
    /// The backend could not produce a usable decision for the task.
    #[error("no decision for task: {0}")]
    Decision(String),
}

impl CapabilityError {
    /// Normalize into the descriptor recorded as the task result.
    pub fn to_descriptor(&self) -> FailureDescriptor {
        match self {
            CapabilityError::Unknown(_) => {
                FailureDescriptor::new(FailureCategory::UnknownCapability, self.to_string())
            }
            CapabilityError::Argument { .. } => {
                FailureDescriptor::new(FailureCategory::InvalidArguments, self.to_string())
            }
            CapabilityError::Execution { failure, .. } => {
                FailureDescriptor::new(failure.category, self.to_string())
            }
            CapabilityError::Decision(_) => {
                FailureDescriptor::new(FailureCategory::Backend, self.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_normalize_to_invalid_arguments() {
        let err = CapabilityError::Argument {
            capability: "add".to_string(),
            problems: vec!["missing argument 'b'".to_string()],
        };
        let descriptor = err.to_descriptor();
        assert_eq!(descriptor.category, FailureCategory::InvalidArguments);
        assert_eq!(
            descriptor.to_string(),
            "error[invalid_arguments]: invalid call to 'add': missing argument 'b'"
        );
    }

    #[test]
    fn execution_errors_keep_the_capability_category() {
        let err = CapabilityError::Execution {
            capability: "divide".to_string(),
            failure: FailureDescriptor::new(FailureCategory::Arithmetic, "division by zero"),
        };
        let descriptor = err.to_descriptor();
        assert_eq!(descriptor.category, FailureCategory::Arithmetic);
        assert!(descriptor.message.contains("division by zero"));
    }

    #[test]
    fn unknown_capability_has_its_own_category() {
        let descriptor = CapabilityError::Unknown("teleport".to_string()).to_descriptor();
        assert_eq!(
            descriptor.to_string(),
            "error[unknown_capability]: unknown capability 'teleport'"
        );
    }

    #[test]
    fn run_failures_name_their_stage() {
        assert_eq!(
            RunFailure::Planning("schema".to_string()).to_string(),
            "planning failed: schema"
        );
    }
}
