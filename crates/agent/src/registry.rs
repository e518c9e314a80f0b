//! Fixed catalog of agents with their mailboxes.

use std::sync::{Mutex, MutexGuard};

use echoshop_core::domain::agent::{Agent, AgentId, Capability};
use echoshop_core::domain::message::AgentMessage;
use echoshop_core::domain::task::TaskId;

use crate::errors::AgentError;
use crate::router::SelectionStrategy;

pub const VOICE_INPUT_AGENT: &str = "voice-input";
pub const INTENT_ROUTER_AGENT: &str = "intent-router";
pub const PROFILE_MANAGER_AGENT: &str = "profile-manager";
pub const DISCOVERY_AGENT: &str = "discovery";
pub const ORDERING_AGENT: &str = "ordering";
pub const RECOMMENDATION_AGENT: &str = "recommendation";
pub const RESPONSE_GENERATOR_AGENT: &str = "response-generator";

pub fn standard_agents() -> Vec<Agent> {
    vec![
        Agent::new(
            VOICE_INPUT_AGENT,
            "Voice Input Agent",
            &["speech_recognition", "audio_processing", "voice_activity_detection"],
        ),
        Agent::new(
            INTENT_ROUTER_AGENT,
            "Intent Router Agent",
            &["intent_classification", "request_routing", "context_analysis"],
        ),
        Agent::new(
            PROFILE_MANAGER_AGENT,
            "Profile Manager Agent",
            &["profile_update", "preference_extraction", "knowledge_graph_management"],
        ),
        Agent::new(
            DISCOVERY_AGENT,
            "Discovery Agent",
            &["restaurant_search", "menu_analysis", "filtering"],
        ),
        Agent::new(
            ORDERING_AGENT,
            "Ordering Agent",
            &["cart_management", "order_processing", "payment_handling"],
        ),
        Agent::new(
            RECOMMENDATION_AGENT,
            "Recommendation Agent",
            &["personalized_suggestions", "trend_analysis", "collaborative_filtering"],
        ),
        Agent::new(
            RESPONSE_GENERATOR_AGENT,
            "Response Generator Agent",
            &["natural_language_generation", "text_to_speech", "conversation_management"],
        ),
    ]
}

/// Agents in registration order. The set is fixed once constructed; only
/// assignment, activity and mailbox contents change.
pub struct AgentRegistry {
    agents: Mutex<Vec<Agent>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new(standard_agents())
    }
}

impl AgentRegistry {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents: Mutex::new(agents) }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Agent>> {
        match self.agents.lock() {
            Ok(agents) => agents,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn snapshot(&self) -> Vec<Agent> {
        self.lock().clone()
    }

    pub fn agent(&self, id: &AgentId) -> Option<Agent> {
        self.lock().iter().find(|agent| &agent.id == id).cloned()
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.lock().iter().any(|agent| &agent.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.lock().iter().filter(|agent| agent.active).count()
    }

    pub fn is_idle(&self, id: &AgentId) -> Result<bool, AgentError> {
        self.lock()
            .iter()
            .find(|agent| &agent.id == id)
            .map(Agent::is_idle)
            .ok_or_else(|| AgentError::UnknownAgent(id.clone()))
    }

    /// Idle agents declaring `capability`, in registry order.
    pub fn idle_with_capability(&self, capability: &Capability) -> Vec<AgentId> {
        self.lock()
            .iter()
            .filter(|agent| agent.is_idle() && agent.has_capability(capability))
            .map(|agent| agent.id.clone())
            .collect()
    }

    /// Filters, selects and marks the chosen agent busy under one lock so two
    /// callers can never claim the same agent.
    pub fn claim(
        &self,
        capability: &Capability,
        task_id: &TaskId,
        strategy: &dyn SelectionStrategy,
    ) -> Option<AgentId> {
        let mut agents = self.lock();
        let candidates = agents
            .iter()
            .filter(|agent| agent.is_idle() && agent.has_capability(capability))
            .collect::<Vec<_>>();
        let chosen = strategy.select(&candidates)?;
        let chosen_id = candidates.get(chosen)?.id.clone();

        let agent = agents.iter_mut().find(|agent| agent.id == chosen_id)?;
        agent.current_task = Some(task_id.clone());
        Some(chosen_id)
    }

    /// Clears the agent's task reference if it still points at `task_id`.
    pub fn release(&self, id: &AgentId, task_id: &TaskId) -> Result<(), AgentError> {
        let mut agents = self.lock();
        let agent = agents
            .iter_mut()
            .find(|agent| &agent.id == id)
            .ok_or_else(|| AgentError::UnknownAgent(id.clone()))?;
        if agent.current_task.as_ref() == Some(task_id) {
            agent.current_task = None;
        }
        Ok(())
    }

    pub fn set_active(&self, id: &AgentId, active: bool) -> Result<(), AgentError> {
        let mut agents = self.lock();
        let agent = agents
            .iter_mut()
            .find(|agent| &agent.id == id)
            .ok_or_else(|| AgentError::UnknownAgent(id.clone()))?;
        agent.active = active;
        Ok(())
    }

    pub fn deliver(&self, message: AgentMessage) -> Result<(), AgentError> {
        let mut agents = self.lock();
        match agents.iter_mut().find(|agent| agent.id == message.to) {
            Some(agent) => {
                agent.mailbox.push(message);
                Ok(())
            }
            None => Err(AgentError::UnknownRecipient(message.to)),
        }
    }

    pub fn mailbox(&self, id: &AgentId) -> Result<Vec<AgentMessage>, AgentError> {
        self.lock()
            .iter()
            .find(|agent| &agent.id == id)
            .map(|agent| agent.mailbox.clone())
            .ok_or_else(|| AgentError::UnknownAgent(id.clone()))
    }

    pub fn drain_mailbox(&self, id: &AgentId) -> Result<Vec<AgentMessage>, AgentError> {
        let mut agents = self.lock();
        let agent = agents
            .iter_mut()
            .find(|agent| &agent.id == id)
            .ok_or_else(|| AgentError::UnknownAgent(id.clone()))?;
        Ok(std::mem::take(&mut agent.mailbox))
    }
}
