use thiserror::Error;

use echoshop_core::domain::agent::AgentId;
use echoshop_core::domain::task::TaskId;
use echoshop_core::errors::{ApplicationError, DomainError, KnowledgeError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("unknown agent `{0}`")]
    UnknownAgent(AgentId),
    #[error("message recipient `{0}` has no mailbox")]
    UnknownRecipient(AgentId),
    #[error("unknown task `{0}`")]
    UnknownTask(TaskId),
    #[error("task `{task_id}` did not finish within {timeout_ms}ms")]
    WaitTimeout { task_id: TaskId, timeout_ms: u64 },
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Failure raised by a stage handler; recorded on the task, never retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
    #[error("completion service failed: {0}")]
    Completion(String),
    #[error("invalid stage input: {0}")]
    InvalidInput(String),
}

impl From<AgentError> for ApplicationError {
    fn from(error: AgentError) -> Self {
        match error {
            AgentError::Domain(error) => Self::Domain(error),
            AgentError::WaitTimeout { .. } => Self::Timeout(error.to_string()),
            other => Self::Integration(other.to_string()),
        }
    }
}
