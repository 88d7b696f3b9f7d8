//! Error types for the mockbosh entity store.

use thiserror::Error;

use crate::types::{TaskId, TaskState};

/// Result type alias for entity store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during entity store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("deployment '{0}' not found")]
    DeploymentNotFound(String),

    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("task {id} already finished in state {state}")]
    TaskFinished { id: TaskId, state: TaskState },

    #[error("invalid seed data: {0}")]
    InvalidSeed(String),
}

impl StateError {
    /// True for the lookup failures callers usually map to "404".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StateError::DeploymentNotFound(_) | StateError::TaskNotFound(_)
        )
    }
}
