use std::sync::Arc;

use echoshop_core::domain::agent::{Agent, AgentId, Capability};
use echoshop_core::domain::task::{TaskId, TaskKind};

use crate::registry::AgentRegistry;

/// The single capability an agent must declare to take a task of `kind`.
pub fn capability_for(kind: TaskKind) -> Capability {
    let tag = match kind {
        TaskKind::VoiceInput => "speech_recognition",
        TaskKind::IntentClassification => "intent_classification",
        TaskKind::ProfileUpdate => "profile_update",
        TaskKind::RestaurantSearch => "restaurant_search",
        TaskKind::OrderProcessing => "order_processing",
        TaskKind::RecommendationGeneration => "personalized_suggestions",
        TaskKind::ResponseGeneration => "natural_language_generation",
    };
    Capability::new(tag)
}

/// Picks one of the idle, capable candidates (given in registry order) and
/// returns its index, or `None` to leave the task unassigned.
pub trait SelectionStrategy: Send + Sync {
    fn select(&self, candidates: &[&Agent]) -> Option<usize>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FirstIdle;

impl SelectionStrategy for FirstIdle {
    fn select(&self, candidates: &[&Agent]) -> Option<usize> {
        (!candidates.is_empty()).then_some(0)
    }
}

pub struct CapabilityRouter {
    registry: Arc<AgentRegistry>,
    strategy: Box<dyn SelectionStrategy>,
}

impl CapabilityRouter {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self::with_strategy(registry, Box::new(FirstIdle))
    }

    pub fn with_strategy(registry: Arc<AgentRegistry>, strategy: Box<dyn SelectionStrategy>) -> Self {
        Self { registry, strategy }
    }

    /// Assigns `task_id` to an idle agent able to run `kind`.
    pub fn route(&self, kind: TaskKind, task_id: &TaskId) -> Option<AgentId> {
        self.registry.claim(&capability_for(kind), task_id, self.strategy.as_ref())
    }

    pub fn idle_candidates(&self, kind: TaskKind) -> Vec<AgentId> {
        self.registry.idle_with_capability(&capability_for(kind))
    }
}
