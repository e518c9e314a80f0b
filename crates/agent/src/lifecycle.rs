//! Task table and the create → route → execute → complete lifecycle.
//!
//! Every task moves `PENDING → IN_PROGRESS → COMPLETED | FAILED`. A task no
//! idle agent can take stays `PENDING` until [`TaskLifecycleManager::assign_pending`]
//! is called for it. Waiters are woken through a per-task `watch` channel,
//! so waiting never polls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use echoshop_core::domain::agent::AgentId;
use echoshop_core::domain::message::{MessagePayload, MessagePriority};
use echoshop_core::domain::task::{AgentTask, TaskId, TaskInput, TaskOutput, TaskStatus};

use crate::bus::MessageBus;
use crate::errors::AgentError;
use crate::handlers::StageExecutor;
use crate::registry::AgentRegistry;
use crate::router::CapabilityRouter;

struct TaskEntry {
    task: AgentTask,
    status: watch::Sender<TaskStatus>,
}

#[derive(Default)]
struct TaskTable {
    order: Vec<TaskId>,
    entries: HashMap<TaskId, TaskEntry>,
}

impl TaskTable {
    fn entry_mut(&mut self, id: &TaskId) -> Result<&mut TaskEntry, AgentError> {
        self.entries.get_mut(id).ok_or_else(|| AgentError::UnknownTask(id.clone()))
    }
}

pub struct TaskLifecycleManager {
    registry: Arc<AgentRegistry>,
    router: CapabilityRouter,
    bus: Arc<MessageBus>,
    executor: Arc<dyn StageExecutor>,
    tasks: Mutex<TaskTable>,
}

impl TaskLifecycleManager {
    pub fn new(
        registry: Arc<AgentRegistry>,
        router: CapabilityRouter,
        bus: Arc<MessageBus>,
        executor: Arc<dyn StageExecutor>,
    ) -> Self {
        Self { registry, router, bus, executor, tasks: Mutex::new(TaskTable::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, TaskTable> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Records a new task and drives it as far as it can go right now.
    ///
    /// Returns the id even when the task could not be routed or its handler
    /// failed; inspect the task to see where it ended up.
    pub async fn create_task(
        &self,
        input: TaskInput,
        priority: MessagePriority,
    ) -> Result<TaskId, AgentError> {
        let task = AgentTask::new(input);
        let id = task.id.clone();
        let kind = task.kind;
        let (status, _) = watch::channel(TaskStatus::Pending);

        {
            let mut table = self.lock();
            table.order.push(id.clone());
            table.entries.insert(id.clone(), TaskEntry { task, status });
        }
        info!(event_name = "agent.task.created", task_id = %id, kind = %kind, "task created");

        self.dispatch(&id, priority).await?;
        Ok(id)
    }

    /// Retries routing for a task left `PENDING`. Tasks in any other state
    /// are returned untouched.
    pub async fn assign_pending(
        &self,
        id: &TaskId,
        priority: MessagePriority,
    ) -> Result<TaskStatus, AgentError> {
        let status = self.task(id).ok_or_else(|| AgentError::UnknownTask(id.clone()))?.status;
        if status != TaskStatus::Pending {
            return Ok(status);
        }
        self.dispatch(id, priority).await
    }

    async fn dispatch(&self, id: &TaskId, priority: MessagePriority) -> Result<TaskStatus, AgentError> {
        let (kind, input) = {
            let table = self.lock();
            let entry = table.entries.get(id).ok_or_else(|| AgentError::UnknownTask(id.clone()))?;
            (entry.task.kind, entry.task.input.clone())
        };

        let Some(agent_id) = self.router.route(kind, id) else {
            info!(event_name = "agent.task.unrouted", task_id = %id, kind = %kind, "no idle agent can take task");
            return Ok(TaskStatus::Pending);
        };
        info!(event_name = "agent.task.assigned", task_id = %id, agent_id = %agent_id, "task assigned");

        if let Err(error) = self.start(id, &agent_id) {
            self.release(&agent_id, id);
            return Err(error);
        }

        self.send(
            AgentId::orchestrator(),
            agent_id.clone(),
            MessagePayload::TaskRequest { task_id: id.clone(), input: input.clone() },
            priority,
        );

        let outcome = self.executor.execute(&input).await;
        self.release(&agent_id, id);
        self.finish(id, &agent_id, outcome.map_err(|error| error.to_string()))
    }

    fn start(&self, id: &TaskId, agent_id: &AgentId) -> Result<(), AgentError> {
        let mut table = self.lock();
        let entry = table.entry_mut(id)?;
        entry.task.start(agent_id.clone())?;
        entry.status.send_replace(entry.task.status);
        Ok(())
    }

    fn finish(
        &self,
        id: &TaskId,
        agent_id: &AgentId,
        outcome: Result<TaskOutput, String>,
    ) -> Result<TaskStatus, AgentError> {
        let (status, payload, priority) = {
            let mut table = self.lock();
            let entry = table.entry_mut(id)?;
            let recorded = match outcome {
                Ok(output) => entry.task.complete(output.clone()).map(|()| Ok(output)),
                Err(error) => entry.task.fail(error.clone()).map(|()| Err(error)),
            };
            let recorded = match recorded {
                Ok(result) => result,
                Err(violation) => {
                    // output of the wrong kind still ends the task
                    let error = violation.to_string();
                    entry.task.fail(error.clone())?;
                    Err(error)
                }
            };
            entry.status.send_replace(entry.task.status);

            match recorded {
                Ok(output) => (
                    entry.task.status,
                    MessagePayload::TaskResponse { task_id: id.clone(), output },
                    MessagePriority::High,
                ),
                Err(error) => (
                    entry.task.status,
                    MessagePayload::Error { task_id: id.clone(), error },
                    MessagePriority::Critical,
                ),
            }
        };

        match &payload {
            MessagePayload::Error { error, .. } => {
                warn!(event_name = "agent.task.failed", task_id = %id, agent_id = %agent_id, error = %error, "task failed");
            }
            _ => {
                info!(event_name = "agent.task.completed", task_id = %id, agent_id = %agent_id, "task completed");
            }
        }
        self.send(agent_id.clone(), AgentId::orchestrator(), payload, priority);
        Ok(status)
    }

    fn release(&self, agent_id: &AgentId, task_id: &TaskId) {
        if let Err(error) = self.registry.release(agent_id, task_id) {
            warn!(event_name = "agent.release_failed", agent_id = %agent_id, error = %error, "agent not released");
        }
    }

    fn send(&self, from: AgentId, to: AgentId, payload: MessagePayload, priority: MessagePriority) {
        if let Err(error) = self.bus.send(from, to, payload, priority) {
            warn!(event_name = "agent.bus.send_failed", error = %error, "message dropped");
        }
    }

    pub fn task(&self, id: &TaskId) -> Option<AgentTask> {
        self.lock().entries.get(id).map(|entry| entry.task.clone())
    }

    /// All known tasks in creation order.
    pub fn tasks(&self) -> Vec<AgentTask> {
        let table = self.lock();
        table.order.iter().filter_map(|id| table.entries.get(id)).map(|entry| entry.task.clone()).collect()
    }

    pub fn count_by_status(&self, status: TaskStatus) -> usize {
        self.lock().entries.values().filter(|entry| entry.task.status == status).count()
    }

    /// Resolves once the task reaches a terminal state, or fails with
    /// [`AgentError::WaitTimeout`] after `timeout`.
    pub async fn wait_for_completion(
        &self,
        id: &TaskId,
        timeout: Duration,
    ) -> Result<AgentTask, AgentError> {
        let mut receiver = {
            let table = self.lock();
            table
                .entries
                .get(id)
                .map(|entry| entry.status.subscribe())
                .ok_or_else(|| AgentError::UnknownTask(id.clone()))?
        };

        let outcome = match tokio::time::timeout(timeout, receiver.wait_for(TaskStatus::is_terminal)).await {
            Ok(Ok(_)) => self.task(id).ok_or_else(|| AgentError::UnknownTask(id.clone())),
            // sender dropped: the task was evicted while we waited
            Ok(Err(_)) => Err(AgentError::UnknownTask(id.clone())),
            Err(_) => Err(AgentError::WaitTimeout {
                task_id: id.clone(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        outcome
    }

    /// Drops finished tasks completed before `cutoff`. Pending and in-flight
    /// tasks are never evicted.
    pub fn evict_finished_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut table = self.lock();
        let expired = table
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.task.status.is_terminal()
                    && entry.task.completed_at.is_some_and(|finished| finished < cutoff)
            })
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();

        for id in &expired {
            table.entries.remove(id);
        }
        let table = &mut *table;
        table.order.retain(|id| table.entries.contains_key(id));

        if !expired.is_empty() {
            info!(event_name = "agent.task.evicted", count = expired.len(), "finished tasks evicted");
        }
        expired.len()
    }
}
