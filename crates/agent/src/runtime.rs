//! The runtime context object. Built once by the entry point and shared by
//! reference; dropping it tears everything down.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::error;

use echoshop_core::config::OrchestratorConfig;
use echoshop_core::domain::agent::{Agent, AgentId};
use echoshop_core::domain::cart::CartItem;
use echoshop_core::domain::message::{AgentMessage, MessagePayload, MessagePriority};
use echoshop_core::domain::task::{AgentTask, TaskId, TaskStatus};
use echoshop_core::errors::{ApplicationError, KnowledgeError};
use echoshop_core::knowledge::{KnowledgeStore, OrderRecord, Recommendation};

use crate::bus::MessageBus;
use crate::cart::{CartBook, Receipt};
use crate::errors::AgentError;
use crate::handlers::{SharedKnowledge, StageHandlers, StageSettings};
use crate::history::{ConversationHistory, ConversationTurn};
use crate::lifecycle::TaskLifecycleManager;
use crate::llm::{CompletionChain, CompletionService};
use crate::pipeline::{PipelineCoordinator, PipelineReply};
use crate::registry::AgentRegistry;
use crate::router::{CapabilityRouter, FirstIdle, SelectionStrategy};
use crate::speech::{NoSpeech, SpeechOutput, SpeechToText, TextToSpeech, Transcription};

pub const NOT_HEARD: &str = "I didn't catch that. Could you please repeat?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub active_agents: usize,
    pub pending_tasks: usize,
    pub in_flight_tasks: usize,
    pub total_messages: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioReply {
    pub transcription: Transcription,
    pub reply: PipelineReply,
    pub speech: SpeechOutput,
}

pub struct AgentRuntime {
    registry: Arc<AgentRegistry>,
    bus: Arc<MessageBus>,
    tasks: Arc<TaskLifecycleManager>,
    pipeline: PipelineCoordinator,
    knowledge: SharedKnowledge,
    carts: Arc<CartBook>,
    history: Arc<ConversationHistory>,
    speech_to_text: Arc<dyn SpeechToText>,
    text_to_speech: Arc<dyn TextToSpeech>,
    wait_timeout: Duration,
    task_retention: Duration,
}

impl AgentRuntime {
    pub fn new(
        config: &OrchestratorConfig,
        store: KnowledgeStore,
        service: Arc<dyn CompletionService>,
    ) -> Self {
        Self::with_strategy(config, store, service, Box::new(FirstIdle))
    }

    pub fn with_strategy(
        config: &OrchestratorConfig,
        store: KnowledgeStore,
        service: Arc<dyn CompletionService>,
        strategy: Box<dyn SelectionStrategy>,
    ) -> Self {
        Self::assemble(config, AgentRegistry::default(), store, service, strategy)
    }

    fn assemble(
        config: &OrchestratorConfig,
        registry: AgentRegistry,
        store: KnowledgeStore,
        service: Arc<dyn CompletionService>,
        strategy: Box<dyn SelectionStrategy>,
    ) -> Self {
        let registry = Arc::new(registry);
        let bus = Arc::new(MessageBus::new(Arc::clone(&registry)));
        let knowledge = Arc::new(RwLock::new(store));
        let carts = Arc::new(CartBook::new());
        let history = Arc::new(ConversationHistory::new());

        let handlers = StageHandlers::new(
            Arc::clone(&knowledge),
            Arc::new(CompletionChain::new(service)),
            Arc::clone(&carts),
            Arc::clone(&history),
            Arc::clone(&bus),
            StageSettings {
                recommendation_limit: config.recommendation_limit,
                history_window: config.history_window,
            },
        );
        let tasks = Arc::new(TaskLifecycleManager::new(
            Arc::clone(&registry),
            CapabilityRouter::with_strategy(Arc::clone(&registry), strategy),
            Arc::clone(&bus),
            Arc::new(handlers),
        ));

        Self {
            registry,
            bus,
            pipeline: PipelineCoordinator::new(Arc::clone(&tasks)),
            tasks,
            knowledge,
            carts,
            history,
            speech_to_text: Arc::new(NoSpeech),
            text_to_speech: Arc::new(NoSpeech),
            wait_timeout: config.wait_timeout(),
            task_retention: Duration::from_secs(config.task_retention_secs),
        }
    }

    pub fn with_speech(
        mut self,
        speech_to_text: Arc<dyn SpeechToText>,
        text_to_speech: Arc<dyn TextToSpeech>,
    ) -> Self {
        self.speech_to_text = speech_to_text;
        self.text_to_speech = text_to_speech;
        self
    }

    /// Always produces a reply; internal failures become a fixed apology.
    pub async fn process_utterance(&self, user_id: &str, utterance: &str) -> PipelineReply {
        match self.pipeline.run(user_id, utterance).await {
            Ok(reply) => reply,
            Err(failure) => {
                error!(event_name = "pipeline.run.failed", user_id, error = %failure, "pipeline run failed");
                PipelineReply::error()
            }
        }
    }

    pub async fn process_audio(&self, user_id: &str, audio: &[u8]) -> AudioReply {
        let transcription = self.speech_to_text.transcribe(audio).await;
        let reply = if transcription.is_usable() {
            match self.pipeline.run_voice(user_id, &transcription.text).await {
                Ok(reply) => reply,
                Err(failure) => {
                    error!(event_name = "pipeline.run.failed", user_id, error = %failure, "voice pipeline run failed");
                    PipelineReply::error()
                }
            }
        } else {
            PipelineReply::fixed(NOT_HEARD)
        };
        let speech = self.text_to_speech.speak(&reply.response).await;

        AudioReply { transcription, reply, speech }
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            active_agents: self.registry.active_count(),
            pending_tasks: self.tasks.count_by_status(TaskStatus::Pending),
            in_flight_tasks: self.tasks.count_by_status(TaskStatus::InProgress),
            total_messages: self.bus.total_messages(),
        }
    }

    pub fn agent_status(&self) -> Vec<Agent> {
        self.registry.snapshot()
    }

    pub fn task_status(&self) -> Vec<AgentTask> {
        self.tasks.tasks()
    }

    pub fn task(&self, id: &TaskId) -> Option<AgentTask> {
        self.tasks.task(id)
    }

    /// Inactive agents are never routed to.
    pub fn set_agent_active(&self, agent_id: &AgentId, active: bool) -> Result<(), AgentError> {
        self.registry.set_active(agent_id, active)?;
        self.bus.send(
            agent_id.clone(),
            AgentId::orchestrator(),
            MessagePayload::StatusUpdate { agent_id: agent_id.clone(), active },
            MessagePriority::Medium,
        )?;
        Ok(())
    }

    pub async fn assign_pending(&self, id: &TaskId) -> Result<TaskStatus, AgentError> {
        self.tasks.assign_pending(id, MessagePriority::High).await
    }

    /// Waits up to the configured timeout for the task to finish.
    pub async fn wait_for_completion(&self, id: &TaskId) -> Result<AgentTask, AgentError> {
        self.tasks.wait_for_completion(id, self.wait_timeout).await
    }

    /// Drops finished tasks older than the configured retention window.
    pub fn evict_finished_tasks(&self) -> usize {
        let Ok(retention) = chrono::Duration::from_std(self.task_retention) else {
            return 0;
        };
        match Utc::now().checked_sub_signed(retention) {
            Some(cutoff) => self.tasks.evict_finished_before(cutoff),
            None => 0,
        }
    }

    /// Moves the user's cart into their order history.
    pub async fn checkout(&self, user_id: &str) -> Result<Receipt, ApplicationError> {
        let mut knowledge = self.knowledge.write().await;
        if knowledge.user_profile(user_id).is_none() {
            return Err(KnowledgeError::UnknownUser(user_id.to_string()).into());
        }

        let items = self.carts.take(user_id);
        for item in &items {
            let mut record = OrderRecord::new(item.restaurant.as_str(), item.name.as_str());
            record.quantity = item.quantity;
            record.price = Some(item.line_total());
            knowledge.add_order_to_history(user_id, record)?;
        }

        Ok(Receipt::new(user_id, items))
    }

    pub fn cart(&self, user_id: &str) -> Vec<CartItem> {
        self.carts.items(user_id)
    }

    pub fn knowledge(&self) -> SharedKnowledge {
        Arc::clone(&self.knowledge)
    }

    pub async fn recommendations(&self, user_id: &str) -> Vec<Recommendation> {
        self.knowledge.read().await.personalized_recommendations(user_id)
    }

    pub fn messages(&self) -> Vec<AgentMessage> {
        self.bus.messages()
    }

    pub fn conversation(&self, user_id: &str) -> Vec<ConversationTurn> {
        self.history.all(user_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use echoshop_core::config::AppConfig;
    use echoshop_core::domain::agent::AgentId;
    use echoshop_core::domain::message::MessageKind;
    use echoshop_core::knowledge::KnowledgeStore;

    use super::{AgentRuntime, NOT_HEARD};
    use crate::llm::DisabledCompletionService;
    use crate::registry::DISCOVERY_AGENT;
    use crate::speech::{NoSpeech, TranscriptPassthrough};

    fn runtime() -> AgentRuntime {
        AgentRuntime::new(
            &AppConfig::default().orchestrator,
            KnowledgeStore::seeded(),
            Arc::new(DisabledCompletionService),
        )
    }

    #[tokio::test]
    async fn toggling_an_agent_emits_a_status_update() {
        let runtime = runtime();
        runtime.set_agent_active(&AgentId::new(DISCOVERY_AGENT), false).expect("known agent");

        assert_eq!(runtime.system_status().active_agents, 6);
        let messages = runtime.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind(), MessageKind::StatusUpdate);
        assert!(runtime.set_agent_active(&AgentId::new("ghost"), true).is_err());
    }

    #[tokio::test]
    async fn unusable_audio_gets_a_fixed_reply_without_tasks() {
        let runtime = runtime();
        let reply = runtime.process_audio("1", b"\xff\xfe").await;

        assert_eq!(reply.reply.response, NOT_HEARD);
        assert!(!reply.speech.success);
        assert!(runtime.task_status().is_empty());
    }

    #[tokio::test]
    async fn audio_runs_a_voice_task_before_the_stages() {
        let runtime = AgentRuntime::new(
            &AppConfig::default().orchestrator,
            KnowledgeStore::seeded(),
            Arc::new(DisabledCompletionService),
        )
        .with_speech(Arc::new(TranscriptPassthrough), Arc::new(NoSpeech));

        let reply = runtime.process_audio("1", b"hello there").await;

        assert!(reply.transcription.success);
        let tasks = runtime.task_status();
        assert_eq!(tasks[0].kind.as_str(), "VOICE_INPUT");
        assert_eq!(tasks.len(), reply.reply.task_ids.len());
        assert!(reply.reply.response.starts_with("Hello!"));
    }

    #[tokio::test]
    async fn eviction_uses_the_retention_window() {
        let runtime = runtime();
        runtime.process_utterance("1", "hello").await;

        assert_eq!(runtime.evict_finished_tasks(), 0);
        assert_eq!(runtime.task_status().len(), 4);
    }
}
