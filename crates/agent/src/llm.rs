use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use echoshop_core::domain::cart::CartItem;
use echoshop_core::domain::intent::{CompletionReply, Intent, IntentScore, ReplyEntities, ReplySource};
use echoshop_core::domain::task::StageContext;
use echoshop_core::knowledge::UserProfile;

use crate::history::ConversationTurn;
use crate::responder::{fallback_intent, RuleBasedResponder};

pub const SYSTEM_PROMPT: &str = r#"You are EchoShop, a voice-first food ordering assistant.
Reply with a single JSON object:
{"response": "<reply, at most 150 words>",
 "intent": "search|order|profile_update|recommendation|confirmation|greeting|help|add_to_cart",
 "confidence": 0.0-1.0,
 "entities": {"food": [], "restaurant": [], "action": "add_to_cart|search|recommend",
              "quantity": 1, "price": 0.0, "modifiers": []}}
Use intent add_to_cart when the user asks to order, add, get, buy or wants an item.
Respect the user's preferences and dietary restrictions."#;

pub const INTENT_PROMPT: &str = "Classify the user's intent as one of: search, order, profile_update, recommendation, confirmation, greeting, help. Respond with JSON: {\"intent\": \"search\", \"confidence\": 0.95}";

const CACHED_INTENT_CONFIDENCE: f64 = 0.95;
const FALLBACK_INTENT_CONFIDENCE: f64 = 0.5;
const UNPARSED_REPLY_CONFIDENCE: f64 = 0.8;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub history: Vec<ConversationTurn>,
    pub utterance: String,
}

impl CompletionRequest {
    pub fn new(
        utterance: &str,
        profile: Option<&UserProfile>,
        context: &StageContext,
        history: Vec<ConversationTurn>,
    ) -> Self {
        let mut system = SYSTEM_PROMPT.to_string();
        if let Some(profile) = profile {
            system.push_str(&format!(
                "\nUser: {} preferences, {} dietary, {} location",
                profile.preferences.join(", "),
                profile.dietary.join(", "),
                profile.location
            ));
        }
        if let Some(results) = &context.search_results {
            let names = results.iter().map(|rec| rec.restaurant.name.as_str()).collect::<Vec<_>>();
            system.push_str(&format!("\nSearch results: {}", names.join(", ")));
        }
        if let Some(order) = &context.order {
            system.push_str(&format!("\nJust added to cart: {}", order.item_names().join(", ")));
        }
        if !context.recommendations.is_empty() {
            let names = context
                .recommendations
                .iter()
                .map(|rec| format!("{} ({:.1})", rec.restaurant.name, rec.personalization_score))
                .collect::<Vec<_>>();
            system.push_str(&format!("\nRecommended: {}", names.join(", ")));
        }

        Self { system, history, utterance: utterance.to_string() }
    }
}

/// External natural-language completion service.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Structured tier: the reply is expected to be a JSON object.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
    /// Legacy tier: free-form reply text.
    async fn complete_legacy(&self, request: &CompletionRequest) -> Result<String>;
    /// Returns a JSON object with `intent` and `confidence`.
    async fn classify_intent(&self, utterance: &str) -> Result<String>;
}

/// Always fails, sending every request down to the rule-based tier.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledCompletionService;

#[async_trait]
impl CompletionService for DisabledCompletionService {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        Err(anyhow!("completion service is disabled"))
    }

    async fn complete_legacy(&self, _request: &CompletionRequest) -> Result<String> {
        Err(anyhow!("completion service is disabled"))
    }

    async fn classify_intent(&self, _utterance: &str) -> Result<String> {
        Err(anyhow!("completion service is disabled"))
    }
}

/// Structured call, then legacy call, then the local responder. Callers
/// always get a reply.
pub struct CompletionChain {
    service: Arc<dyn CompletionService>,
    responder: RuleBasedResponder,
    intent_cache: Mutex<HashMap<String, Intent>>,
}

impl CompletionChain {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self { service, responder: RuleBasedResponder::new(), intent_cache: Mutex::new(HashMap::new()) }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledCompletionService))
    }

    pub fn responder(&self) -> &RuleBasedResponder {
        &self.responder
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Intent>> {
        match self.intent_cache.lock() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn cached_intents(&self) -> usize {
        self.cache().len()
    }

    pub async fn classify_intent(&self, utterance: &str) -> IntentScore {
        let key = utterance.trim().to_lowercase();
        if let Some(intent) = self.cache().get(&key).copied() {
            return IntentScore::new(intent, CACHED_INTENT_CONFIDENCE);
        }

        let classified = match self.service.classify_intent(utterance).await {
            Ok(raw) => parse_intent_score(&raw),
            Err(error) => Err(error),
        };
        match classified {
            Ok(score) => {
                self.cache().insert(key, score.intent);
                score
            }
            Err(error) => {
                warn!(
                    event_name = "completion.intent.fallback",
                    error = %error,
                    "intent classification failed, using keyword intent"
                );
                IntentScore::new(fallback_intent(utterance), FALLBACK_INTENT_CONFIDENCE)
            }
        }
    }

    /// Structured tier, then legacy, then the rule-based responder. A tier
    /// whose reply text is blank counts as failed.
    pub async fn respond(
        &self,
        request: &CompletionRequest,
        profile: Option<&UserProfile>,
        cart: &[CartItem],
    ) -> CompletionReply {
        let started = Instant::now();
        let mut reply = self.first_usable_reply(request, profile, cart).await;
        reply.processing_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            event_name = "completion.reply.produced",
            source = ?reply.source,
            processing_ms = reply.processing_ms,
            "completion chain produced a reply"
        );
        reply
    }

    async fn first_usable_reply(
        &self,
        request: &CompletionRequest,
        profile: Option<&UserProfile>,
        cart: &[CartItem],
    ) -> CompletionReply {
        match self.service.complete(request).await {
            Ok(raw) => {
                let reply = parse_structured_reply(&raw);
                if !reply.response.trim().is_empty() {
                    return reply;
                }
                warn!(
                    event_name = "completion.fallback.legacy",
                    error = "empty structured reply",
                    "structured completion returned no text, trying legacy completion"
                );
            }
            Err(error) => warn!(
                event_name = "completion.fallback.legacy",
                error = %error,
                "structured completion failed, trying legacy completion"
            ),
        }

        match self.service.complete_legacy(request).await {
            Ok(text) if !text.trim().is_empty() => {
                return CompletionReply {
                    response: text.trim().to_string(),
                    intent: fallback_intent(&request.utterance),
                    confidence: FALLBACK_INTENT_CONFIDENCE,
                    entities: ReplyEntities::default(),
                    source: ReplySource::Legacy,
                    processing_ms: 0,
                };
            }
            Ok(_) => warn!(
                event_name = "completion.fallback.rule_based",
                error = "empty legacy reply",
                "legacy completion returned nothing, using rule-based responder"
            ),
            Err(error) => warn!(
                event_name = "completion.fallback.rule_based",
                error = %error,
                "legacy completion failed, using rule-based responder"
            ),
        }

        self.responder.respond(&request.utterance, profile, cart)
    }
}

#[derive(Debug, Deserialize)]
struct RawIntent {
    intent: String,
    confidence: Option<f64>,
}

pub fn parse_intent_score(raw: &str) -> Result<IntentScore> {
    let parsed: RawIntent = serde_json::from_str(raw.trim())?;
    let intent = parsed.intent.parse::<Intent>()?;
    Ok(IntentScore::new(intent, parsed.confidence.unwrap_or(CACHED_INTENT_CONFIDENCE)))
}

#[derive(Debug, Deserialize)]
struct RawReply {
    response: String,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    entities: Option<ReplyEntities>,
}

/// Parses a structured reply. Anything that is not a JSON object with a
/// `response` field is returned verbatim as a search reply.
pub fn parse_structured_reply(raw: &str) -> CompletionReply {
    match serde_json::from_str::<RawReply>(raw.trim()) {
        Ok(parsed) => {
            let intent = parsed
                .intent
                .as_deref()
                .and_then(|label| label.parse::<Intent>().ok())
                .unwrap_or(Intent::Search);
            CompletionReply {
                response: parsed.response,
                intent,
                confidence: parsed.confidence.unwrap_or(UNPARSED_REPLY_CONFIDENCE).clamp(0.0, 1.0),
                entities: parsed.entities.unwrap_or_default(),
                source: ReplySource::Structured,
                processing_ms: 0,
            }
        }
        Err(_) => CompletionReply {
            response: raw.trim().to_string(),
            intent: Intent::Search,
            confidence: UNPARSED_REPLY_CONFIDENCE,
            entities: ReplyEntities::default(),
            source: ReplySource::Structured,
            processing_ms: 0,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use echoshop_core::domain::intent::{Intent, ReplySource};
    use echoshop_core::domain::task::StageContext;

    use super::{
        parse_intent_score, parse_structured_reply, CompletionChain, CompletionRequest,
        CompletionService,
    };

    #[derive(Default)]
    struct Scripted {
        structured: Option<String>,
        legacy: Option<String>,
        intent: Option<String>,
        intent_calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            self.structured.clone().ok_or_else(|| anyhow!("structured down"))
        }

        async fn complete_legacy(&self, _request: &CompletionRequest) -> Result<String> {
            self.legacy.clone().ok_or_else(|| anyhow!("legacy down"))
        }

        async fn classify_intent(&self, _utterance: &str) -> Result<String> {
            self.intent_calls.fetch_add(1, Ordering::SeqCst);
            self.intent.clone().ok_or_else(|| anyhow!("intent down"))
        }
    }

    fn request(utterance: &str) -> CompletionRequest {
        CompletionRequest::new(utterance, None, &StageContext::default(), Vec::new())
    }

    #[tokio::test]
    async fn structured_tier_wins_when_available() {
        let chain = CompletionChain::new(Arc::new(Scripted {
            structured: Some(r#"{"response":"On it","intent":"add_to_cart","confidence":0.9}"#.into()),
            legacy: Some("legacy".into()),
            ..Scripted::default()
        }));

        let reply = chain.respond(&request("order pizza"), None, &[]).await;
        assert_eq!(reply.response, "On it");
        assert_eq!(reply.intent, Intent::AddToCart);
        assert_eq!(reply.source, ReplySource::Structured);
    }

    #[tokio::test]
    async fn legacy_tier_answers_when_structured_fails() {
        let chain = CompletionChain::new(Arc::new(Scripted {
            legacy: Some("  Here are some options.  ".into()),
            ..Scripted::default()
        }));

        let reply = chain.respond(&request("find noodles"), None, &[]).await;
        assert_eq!(reply.response, "Here are some options.");
        assert_eq!(reply.intent, Intent::Search);
        assert_eq!(reply.source, ReplySource::Legacy);
    }

    #[tokio::test]
    async fn rule_based_tier_is_the_last_resort() {
        let chain = CompletionChain::disabled();
        let reply = chain.respond(&request("order a pizza"), None, &[]).await;

        assert_eq!(reply.source, ReplySource::RuleBased);
        assert_eq!(reply.intent, Intent::AddToCart);
    }

    #[tokio::test]
    async fn blank_tiers_count_as_failures() {
        let chain = CompletionChain::new(Arc::new(Scripted {
            structured: Some(r#"{"response":"   "}"#.into()),
            legacy: Some("Try the noodles.".into()),
            ..Scripted::default()
        }));
        let reply = chain.respond(&request("find noodles"), None, &[]).await;
        assert_eq!(reply.source, ReplySource::Legacy);
        assert_eq!(reply.response, "Try the noodles.");

        let chain = CompletionChain::new(Arc::new(Scripted {
            structured: Some(String::new()),
            legacy: Some(String::new()),
            ..Scripted::default()
        }));
        let reply = chain.respond(&request("hello"), None, &[]).await;
        assert_eq!(reply.source, ReplySource::RuleBased);
        assert!(!reply.response.trim().is_empty());
    }

    struct Slow;

    #[async_trait]
    impl CompletionService for Slow {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
            Ok(r#"{"response":"Done"}"#.to_string())
        }

        async fn complete_legacy(&self, _request: &CompletionRequest) -> Result<String> {
            Err(anyhow!("unused"))
        }

        async fn classify_intent(&self, _utterance: &str) -> Result<String> {
            Err(anyhow!("unused"))
        }
    }

    #[tokio::test]
    async fn reply_records_processing_time() {
        let chain = CompletionChain::new(Arc::new(Slow));

        let reply = chain.respond(&request("hello"), None, &[]).await;

        assert_eq!(reply.response, "Done");
        assert!(reply.processing_ms >= 25, "took {}ms", reply.processing_ms);
    }

    #[tokio::test]
    async fn intent_results_are_cached_by_normalized_utterance() {
        let service = Arc::new(Scripted {
            intent: Some(r#"{"intent":"greeting","confidence":0.7}"#.into()),
            ..Scripted::default()
        });
        let chain = CompletionChain::new(service.clone());

        let first = chain.classify_intent("Hello there").await;
        let second = chain.classify_intent("  hello THERE ").await;

        assert_eq!(first.intent, Intent::Greeting);
        assert_eq!(first.confidence, 0.7);
        assert_eq!(second.intent, Intent::Greeting);
        assert_eq!(second.confidence, 0.95);
        assert_eq!(service.intent_calls.load(Ordering::SeqCst), 1);
        assert_eq!(chain.cached_intents(), 1);
    }

    #[tokio::test]
    async fn failed_classification_uses_keywords_and_is_not_cached() {
        let chain = CompletionChain::disabled();
        let score = chain.classify_intent("add garlic bread").await;

        assert_eq!(score.intent, Intent::Order);
        assert_eq!(score.confidence, 0.5);
        assert_eq!(chain.cached_intents(), 0);
    }

    #[test]
    fn non_json_reply_is_wrapped_as_search() {
        let reply = parse_structured_reply("Sure, Tony's is great tonight.");

        assert_eq!(reply.response, "Sure, Tony's is great tonight.");
        assert_eq!(reply.intent, Intent::Search);
        assert_eq!(reply.confidence, 0.8);
    }

    #[test]
    fn unknown_intent_label_degrades_to_search() {
        let reply = parse_structured_reply(r#"{"response":"ok","intent":"dance"}"#);
        assert_eq!(reply.intent, Intent::Search);
        assert_eq!(reply.response, "ok");
    }

    #[test]
    fn intent_score_requires_a_known_label() {
        assert!(parse_intent_score(r#"{"intent":"help"}"#).is_ok());
        assert!(parse_intent_score(r#"{"intent":"teleport","confidence":1.0}"#).is_err());
        assert!(parse_intent_score("not json").is_err());
    }
}
