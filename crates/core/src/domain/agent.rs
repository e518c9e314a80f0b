use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::message::AgentMessage;
use crate::domain::task::TaskId;

/// Sender/recipient id used by the pipeline coordinator itself.
pub const ORCHESTRATOR_ID: &str = "orchestrator";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn orchestrator() -> Self {
        Self(ORCHESTRATOR_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability(pub String);

impl Capability {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub active: bool,
    pub current_task: Option<TaskId>,
    pub mailbox: Vec<AgentMessage>,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, capabilities: &[&str]) -> Self {
        Self {
            id: AgentId::new(id),
            name: name.into(),
            capabilities: capabilities.iter().map(|tag| Capability::new(*tag)).collect(),
            active: true,
            current_task: None,
            mailbox: Vec::new(),
        }
    }

    pub fn has_capability(&self, capability: &Capability) -> bool {
        self.capabilities.iter().any(|declared| declared == capability)
    }

    pub fn is_idle(&self) -> bool {
        self.active && self.current_task.is_none()
    }
}
