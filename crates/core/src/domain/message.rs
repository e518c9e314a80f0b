use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::task::{TaskId, TaskInput, TaskOutput};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(format!("msg_{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    TaskRequest,
    TaskResponse,
    DataUpdate,
    StatusUpdate,
    Error,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagePriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// One payload shape per message kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagePayload {
    TaskRequest { task_id: TaskId, input: TaskInput },
    TaskResponse { task_id: TaskId, output: TaskOutput },
    DataUpdate { topic: String, user_id: String, values: Vec<String> },
    StatusUpdate { agent_id: AgentId, active: bool },
    Error { task_id: TaskId, error: String },
}

impl MessagePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::TaskRequest { .. } => MessageKind::TaskRequest,
            Self::TaskResponse { .. } => MessageKind::TaskResponse,
            Self::DataUpdate { .. } => MessageKind::DataUpdate,
            Self::StatusUpdate { .. } => MessageKind::StatusUpdate,
            Self::Error { .. } => MessageKind::Error,
        }
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::TaskRequest { task_id, .. }
            | Self::TaskResponse { task_id, .. }
            | Self::Error { task_id, .. } => Some(task_id),
            Self::DataUpdate { .. } | Self::StatusUpdate { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: MessageId,
    pub from: AgentId,
    pub to: AgentId,
    pub payload: MessagePayload,
    pub priority: MessagePriority,
    pub created_at: DateTime<Utc>,
}

impl AgentMessage {
    pub fn new(
        from: AgentId,
        to: AgentId,
        payload: MessagePayload,
        priority: MessagePriority,
    ) -> Self {
        Self { id: MessageId::generate(), from, to, payload, priority, created_at: Utc::now() }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}
