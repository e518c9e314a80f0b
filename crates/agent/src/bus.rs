//! Append-only message log with per-recipient delivery.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use echoshop_core::domain::agent::{AgentId, ORCHESTRATOR_ID};
use echoshop_core::domain::message::{AgentMessage, MessageId, MessagePayload, MessagePriority};

use crate::errors::AgentError;
use crate::registry::AgentRegistry;

/// Every accepted message is appended to the log and lands in exactly one
/// mailbox: an agent's, or the orchestrator inbox held here.
pub struct MessageBus {
    registry: Arc<AgentRegistry>,
    log: Mutex<Vec<AgentMessage>>,
    orchestrator_inbox: Mutex<Vec<AgentMessage>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MessageBus {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry, log: Mutex::new(Vec::new()), orchestrator_inbox: Mutex::new(Vec::new()) }
    }

    pub fn send(
        &self,
        from: AgentId,
        to: AgentId,
        payload: MessagePayload,
        priority: MessagePriority,
    ) -> Result<MessageId, AgentError> {
        let message = AgentMessage::new(from, to, payload, priority);
        let id = message.id.clone();
        let kind = message.kind();
        let recipient = message.to.clone();

        // log first so log order matches delivery order under concurrent sends
        let mut log = lock(&self.log);
        if recipient.as_str() == ORCHESTRATOR_ID {
            lock(&self.orchestrator_inbox).push(message.clone());
        } else {
            self.registry.deliver(message.clone())?;
        }
        log.push(message);
        drop(log);

        debug!(
            event_name = "agent.bus.message_sent",
            message_id = %id,
            to = %recipient,
            kind = ?kind,
            priority = ?priority,
            "message placed on bus"
        );
        Ok(id)
    }

    pub fn total_messages(&self) -> usize {
        lock(&self.log).len()
    }

    pub fn messages(&self) -> Vec<AgentMessage> {
        lock(&self.log).clone()
    }

    pub fn orchestrator_inbox(&self) -> Vec<AgentMessage> {
        lock(&self.orchestrator_inbox).clone()
    }
}
