//! Stage handlers, one per task kind.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use echoshop_core::domain::agent::AgentId;
use echoshop_core::domain::cart::{CartItem, OrderResult, OrderStatus};
use echoshop_core::domain::message::{MessagePayload, MessagePriority};
use echoshop_core::domain::task::{TaskInput, TaskOutput};
use echoshop_core::knowledge::{extract_preferences, KnowledgeStore, Recommendation};

use crate::bus::MessageBus;
use crate::cart::CartBook;
use crate::errors::StageError;
use crate::history::{ConversationHistory, Role};
use crate::llm::{CompletionChain, CompletionRequest};
use crate::registry::{PROFILE_MANAGER_AGENT, RECOMMENDATION_AGENT};

pub type SharedKnowledge = Arc<RwLock<KnowledgeStore>>;

/// Runs the work for one task. Implementations must not assume a task is
/// retried after an error.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, input: &TaskInput) -> Result<TaskOutput, StageError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageSettings {
    pub recommendation_limit: usize,
    pub history_window: usize,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self { recommendation_limit: 3, history_window: 4 }
    }
}

pub struct StageHandlers {
    knowledge: SharedKnowledge,
    completion: Arc<CompletionChain>,
    carts: Arc<CartBook>,
    history: Arc<ConversationHistory>,
    bus: Arc<MessageBus>,
    settings: StageSettings,
}

impl StageHandlers {
    pub fn new(
        knowledge: SharedKnowledge,
        completion: Arc<CompletionChain>,
        carts: Arc<CartBook>,
        history: Arc<ConversationHistory>,
        bus: Arc<MessageBus>,
        settings: StageSettings,
    ) -> Self {
        Self { knowledge, completion, carts, history, bus, settings }
    }

    async fn update_profile(&self, user_id: &str, utterance: &str) -> Result<TaskOutput, StageError> {
        let extracted = extract_preferences(utterance);
        self.knowledge.write().await.update_user_preferences(
            user_id,
            &extracted.preferences,
            &extracted.dietary,
        )?;

        if !extracted.is_empty() {
            let values =
                extracted.preferences.iter().chain(extracted.dietary.iter()).cloned().collect();
            let sent = self.bus.send(
                AgentId::new(PROFILE_MANAGER_AGENT),
                AgentId::new(RECOMMENDATION_AGENT),
                MessagePayload::DataUpdate {
                    topic: "preferences".to_string(),
                    user_id: user_id.to_string(),
                    values,
                },
                MessagePriority::Medium,
            );
            if let Err(error) = sent {
                warn!(event_name = "agent.bus.send_failed", user_id, error = %error, "profile update not announced");
            }
        }

        Ok(TaskOutput::ProfileUpdate {
            preferences: extracted.preferences,
            dietary: extracted.dietary,
        })
    }

    /// A recognised dish wins; otherwise the top search hit's first dish,
    /// then the house default.
    fn process_order(
        &self,
        user_id: &str,
        utterance: &str,
        search_results: Option<&[Recommendation]>,
    ) -> TaskOutput {
        let responder = self.completion.responder();
        let item = responder
            .recognise_item(utterance)
            .or_else(|| search_results.and_then(top_search_item))
            .unwrap_or_else(|| responder.default_item());
        self.carts.add(user_id, item.clone());
        TaskOutput::OrderProcessing(OrderResult { status: OrderStatus::AddedToCart, items: vec![item] })
    }
}

fn top_search_item(results: &[Recommendation]) -> Option<CartItem> {
    let top = results.first()?;
    let dish = top.restaurant.dishes.first()?;
    Some(CartItem {
        name: dish.name.clone(),
        restaurant: top.restaurant.name.clone(),
        unit_price: dish.price,
        quantity: 1,
        modifiers: Vec::new(),
    })
}

#[async_trait]
impl StageExecutor for StageHandlers {
    async fn execute(&self, input: &TaskInput) -> Result<TaskOutput, StageError> {
        match input {
            TaskInput::VoiceInput { transcript } => {
                let transcript = transcript.trim();
                if transcript.is_empty() {
                    return Err(StageError::InvalidInput("empty transcript".to_string()));
                }
                Ok(TaskOutput::VoiceInput { transcript: transcript.to_string() })
            }
            TaskInput::IntentClassification { utterance } => {
                Ok(TaskOutput::IntentClassification(self.completion.classify_intent(utterance).await))
            }
            TaskInput::ProfileUpdate { user_id, utterance } => {
                self.update_profile(user_id, utterance).await
            }
            TaskInput::RestaurantSearch { user_id } => {
                let restaurants = self.knowledge.read().await.personalized_recommendations(user_id);
                Ok(TaskOutput::RestaurantSearch { restaurants })
            }
            TaskInput::OrderProcessing { user_id, utterance, search_results } => {
                Ok(self.process_order(user_id, utterance, search_results.as_deref()))
            }
            TaskInput::RecommendationGeneration { user_id } => {
                let mut recommendations =
                    self.knowledge.read().await.personalized_recommendations(user_id);
                recommendations.truncate(self.settings.recommendation_limit);
                Ok(TaskOutput::RecommendationGeneration { recommendations })
            }
            TaskInput::ResponseGeneration { user_id, utterance, context } => {
                let profile = self.knowledge.read().await.user_profile(user_id).cloned();
                let history = self.history.recent(user_id, self.settings.history_window);
                let request = CompletionRequest::new(utterance, profile.as_ref(), context, history);
                let cart = self.carts.items(user_id);

                let reply = self.completion.respond(&request, profile.as_ref(), &cart).await;
                self.history.record(user_id, Role::User, utterance.as_str());
                self.history.record(user_id, Role::Assistant, reply.response.as_str());
                Ok(TaskOutput::ResponseGeneration(reply))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use tokio::sync::RwLock;

    use echoshop_core::domain::agent::AgentId;
    use echoshop_core::domain::intent::ReplySource;
    use echoshop_core::domain::message::{MessageKind, MessagePayload};
    use echoshop_core::domain::task::{StageContext, TaskInput, TaskOutput};
    use echoshop_core::errors::KnowledgeError;
    use echoshop_core::knowledge::KnowledgeStore;

    use super::{StageExecutor, StageHandlers, StageSettings};
    use crate::bus::MessageBus;
    use crate::cart::CartBook;
    use crate::errors::StageError;
    use crate::history::ConversationHistory;
    use crate::llm::CompletionChain;
    use crate::registry::{AgentRegistry, RECOMMENDATION_AGENT};

    struct Fixture {
        handlers: StageHandlers,
        registry: Arc<AgentRegistry>,
        carts: Arc<CartBook>,
        history: Arc<ConversationHistory>,
        knowledge: Arc<RwLock<KnowledgeStore>>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(AgentRegistry::default());
        let bus = Arc::new(MessageBus::new(Arc::clone(&registry)));
        let knowledge = Arc::new(RwLock::new(KnowledgeStore::seeded()));
        let carts = Arc::new(CartBook::new());
        let history = Arc::new(ConversationHistory::new());
        let handlers = StageHandlers::new(
            Arc::clone(&knowledge),
            Arc::new(CompletionChain::disabled()),
            Arc::clone(&carts),
            Arc::clone(&history),
            bus,
            StageSettings::default(),
        );
        Fixture { handlers, registry, carts, history, knowledge }
    }

    #[tokio::test]
    async fn profile_update_merges_and_announces() {
        let fixture = fixture();
        let output = fixture
            .handlers
            .execute(&TaskInput::ProfileUpdate {
                user_id: "2".to_string(),
                utterance: "I'm vegan and into thai now".to_string(),
            })
            .await
            .expect("known user");

        assert_eq!(
            output,
            TaskOutput::ProfileUpdate {
                preferences: vec!["thai".to_string()],
                dietary: vec!["Vegan".to_string()],
            }
        );
        let store = fixture.knowledge.read().await;
        let mike = store.user_profile("2").expect("mike");
        assert!(mike.preferences.contains(&"thai".to_string()));

        let mailbox = fixture
            .registry
            .mailbox(&AgentId::new(RECOMMENDATION_AGENT))
            .expect("recommendation agent");
        assert_eq!(mailbox.len(), 1);
        assert_eq!(mailbox[0].kind(), MessageKind::DataUpdate);
        assert!(matches!(
            &mailbox[0].payload,
            MessagePayload::DataUpdate { values, .. } if values == &vec!["thai".to_string(), "Vegan".to_string()]
        ));
    }

    #[tokio::test]
    async fn profile_update_for_unknown_user_fails() {
        let fixture = fixture();
        let result = fixture
            .handlers
            .execute(&TaskInput::ProfileUpdate {
                user_id: "404".to_string(),
                utterance: "italian".to_string(),
            })
            .await;

        assert_eq!(result, Err(StageError::Knowledge(KnowledgeError::UnknownUser("404".to_string()))));
    }

    #[tokio::test]
    async fn order_stage_adds_recognised_or_default_item() {
        let fixture = fixture();
        for utterance in ["add 2 quinoa salads", "order something"] {
            fixture
                .handlers
                .execute(&TaskInput::OrderProcessing {
                    user_id: "1".to_string(),
                    utterance: utterance.to_string(),
                    search_results: None,
                })
                .await
                .expect("order stage");
        }

        let cart = fixture.carts.items("1");
        let names: Vec<_> = cart.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Quinoa Salad", "Margherita Pizza"]);
        assert_eq!(cart[0].quantity, 2);
        assert_eq!(cart[1].unit_price, Decimal::new(1899, 2));
    }

    #[tokio::test]
    async fn order_stage_falls_back_to_the_top_search_hit() {
        let fixture = fixture();
        let results = fixture.knowledge.read().await.personalized_recommendations("1");
        let top = results.first().expect("seeded user has matches").restaurant.clone();

        for utterance in ["order something", "add 2 quinoa salads"] {
            fixture
                .handlers
                .execute(&TaskInput::OrderProcessing {
                    user_id: "1".to_string(),
                    utterance: utterance.to_string(),
                    search_results: Some(results.clone()),
                })
                .await
                .expect("order stage");
        }

        let cart = fixture.carts.items("1");
        assert_eq!(cart.len(), 2);
        assert_eq!(cart[0].name, top.dishes[0].name);
        assert_eq!(cart[0].restaurant, top.name);
        assert_eq!(cart[0].unit_price, top.dishes[0].price);
        assert_eq!(cart[0].quantity, 1);
        assert_eq!(cart[1].name, "Quinoa Salad");
    }

    #[tokio::test]
    async fn recommendations_respect_the_limit() {
        let fixture = fixture();
        fixture
            .knowledge
            .write()
            .await
            .update_user_preferences(
                "3",
                &["Asian".to_string(), "Healthy".to_string(), "Italian".to_string()],
                &[],
            )
            .expect("known user");

        let output = fixture
            .handlers
            .execute(&TaskInput::RecommendationGeneration { user_id: "3".to_string() })
            .await
            .expect("recommendations");

        match output {
            TaskOutput::RecommendationGeneration { recommendations } => {
                assert_eq!(recommendations.len(), 3);
                assert_eq!(recommendations[0].restaurant.name, "Tony's Italian");
            }
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[tokio::test]
    async fn response_generation_records_both_turns() {
        let fixture = fixture();
        let output = fixture
            .handlers
            .execute(&TaskInput::ResponseGeneration {
                user_id: "1".to_string(),
                utterance: "hello".to_string(),
                context: StageContext::default(),
            })
            .await
            .expect("response");

        match output {
            TaskOutput::ResponseGeneration(reply) => assert_eq!(reply.source, ReplySource::RuleBased),
            other => panic!("unexpected output {other:?}"),
        }
        assert_eq!(fixture.history.all("1").len(), 2);
    }

    #[tokio::test]
    async fn blank_transcript_fails_the_voice_stage() {
        let fixture = fixture();
        let result = fixture
            .handlers
            .execute(&TaskInput::VoiceInput { transcript: "   ".to_string() })
            .await;

        assert!(matches!(result, Err(StageError::InvalidInput(_))));
    }
}
