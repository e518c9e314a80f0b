//! The fixed six-stage run for one utterance.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use echoshop_core::domain::intent::{CompletionReply, Intent, ReplyEntities, ReplySource};
use echoshop_core::domain::message::MessagePriority;
use echoshop_core::domain::task::{StageContext, TaskId, TaskInput, TaskOutput, TaskStatus};

use crate::errors::AgentError;
use crate::lifecycle::TaskLifecycleManager;

pub const STOP_PHRASES: [&str; 6] = ["stop", "ok stop", "stop listening", "quit", "exit", "end"];
pub const TERMINATION_MESSAGE: &str =
    "Voice interface stopped. Click the microphone button to start again.";
pub const APOLOGY: &str = "I apologize, but I could not process your request. Please try again.";
pub const ERROR_REPLY: &str = "I encountered an error processing your request. Please try again.";

const SEARCH_TRIGGERS: [&str; 4] = ["search", "find", "pizza", "restaurant"];
const ORDER_TRIGGERS: [&str; 3] = ["order", "add", "pizza"];

/// Whole-utterance match, not a substring test: "stop the music" is not a
/// stop command.
pub fn is_stop_command(utterance: &str) -> bool {
    let normalized = utterance.trim().to_lowercase();
    STOP_PHRASES.contains(&normalized.as_str())
}

/// Coarse substring test; "address" triggers an order, "sushi" triggers
/// nothing.
pub fn triggers_search(utterance: &str) -> bool {
    let lowered = utterance.to_lowercase();
    SEARCH_TRIGGERS.iter().any(|term| lowered.contains(term))
}

pub fn triggers_order(utterance: &str) -> bool {
    let lowered = utterance.to_lowercase();
    ORDER_TRIGGERS.iter().any(|term| lowered.contains(term))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineReply {
    pub response: String,
    pub intent: Option<Intent>,
    pub confidence: f64,
    pub entities: ReplyEntities,
    pub source: Option<ReplySource>,
    pub stopped: bool,
    pub task_ids: Vec<TaskId>,
    /// Time the completion chain took; zero for canned replies.
    #[serde(default)]
    pub processing_ms: u64,
}

impl PipelineReply {
    fn canned(response: &str, task_ids: Vec<TaskId>) -> Self {
        Self {
            response: response.to_string(),
            intent: None,
            confidence: 0.0,
            entities: ReplyEntities::default(),
            source: None,
            stopped: false,
            task_ids,
            processing_ms: 0,
        }
    }

    pub fn stopped() -> Self {
        Self { stopped: true, ..Self::canned(TERMINATION_MESSAGE, Vec::new()) }
    }

    pub fn apology(task_ids: Vec<TaskId>) -> Self {
        Self::canned(APOLOGY, task_ids)
    }

    pub fn error() -> Self {
        Self::canned(ERROR_REPLY, Vec::new())
    }

    /// Reply for an utterance that never made it into the pipeline.
    pub fn fixed(response: &str) -> Self {
        Self::canned(response, Vec::new())
    }

    fn from_completion(reply: CompletionReply, task_ids: Vec<TaskId>) -> Self {
        Self {
            response: reply.response,
            intent: Some(reply.intent),
            confidence: reply.confidence,
            entities: reply.entities,
            source: Some(reply.source),
            stopped: false,
            task_ids,
            processing_ms: reply.processing_ms,
        }
    }
}

pub struct PipelineCoordinator {
    tasks: Arc<TaskLifecycleManager>,
}

impl PipelineCoordinator {
    pub fn new(tasks: Arc<TaskLifecycleManager>) -> Self {
        Self { tasks }
    }

    /// Runs the six stages in order. Stages that fail or find no idle agent
    /// contribute nothing to later stages; the run only errors on internal
    /// bookkeeping failures.
    pub async fn run(&self, user_id: &str, utterance: &str) -> Result<PipelineReply, AgentError> {
        if is_stop_command(utterance) {
            info!(event_name = "pipeline.run.stopped", user_id, "stop phrase received");
            return Ok(PipelineReply::stopped());
        }
        let mut task_ids = Vec::new();
        self.run_stages(user_id, utterance, &mut task_ids).await
    }

    /// Voice path: a `VOICE_INPUT` passthrough task precedes the six stages.
    pub async fn run_voice(&self, user_id: &str, transcript: &str) -> Result<PipelineReply, AgentError> {
        if is_stop_command(transcript) {
            info!(event_name = "pipeline.run.stopped", user_id, "stop phrase received");
            return Ok(PipelineReply::stopped());
        }

        let mut task_ids = Vec::new();
        let voice = TaskInput::VoiceInput { transcript: transcript.to_string() };
        match self.stage(voice, &mut task_ids).await? {
            Some(TaskOutput::VoiceInput { transcript }) => {
                self.run_stages(user_id, &transcript, &mut task_ids).await
            }
            _ => Ok(PipelineReply::apology(task_ids)),
        }
    }

    async fn run_stages(
        &self,
        user_id: &str,
        utterance: &str,
        task_ids: &mut Vec<TaskId>,
    ) -> Result<PipelineReply, AgentError> {
        info!(event_name = "pipeline.run.started", user_id, "pipeline run started");
        let user = user_id.to_string();
        let mut context = StageContext::default();

        let classified = self
            .stage(TaskInput::IntentClassification { utterance: utterance.to_string() }, task_ids)
            .await?;
        if let Some(TaskOutput::IntentClassification(score)) = classified {
            context.intent = Some(score);
        }

        self.stage(TaskInput::ProfileUpdate { user_id: user.clone(), utterance: utterance.to_string() }, task_ids)
            .await?;

        if triggers_search(utterance) {
            let found = self.stage(TaskInput::RestaurantSearch { user_id: user.clone() }, task_ids).await?;
            if let Some(TaskOutput::RestaurantSearch { restaurants }) = found {
                context.search_results = Some(restaurants);
            }
        }

        if triggers_order(utterance) {
            let input = TaskInput::OrderProcessing {
                user_id: user.clone(),
                utterance: utterance.to_string(),
                search_results: context.search_results.clone(),
            };
            if let Some(TaskOutput::OrderProcessing(order)) = self.stage(input, task_ids).await? {
                context.order = Some(order);
            }
        }

        let recommended =
            self.stage(TaskInput::RecommendationGeneration { user_id: user.clone() }, task_ids).await?;
        if let Some(TaskOutput::RecommendationGeneration { recommendations }) = recommended {
            context.recommendations = recommendations;
        }

        let input = TaskInput::ResponseGeneration { user_id: user, utterance: utterance.to_string(), context };
        let reply = match self.stage(input, task_ids).await? {
            Some(TaskOutput::ResponseGeneration(reply)) if !reply.response.trim().is_empty() => {
                PipelineReply::from_completion(reply, std::mem::take(task_ids))
            }
            _ => PipelineReply::apology(std::mem::take(task_ids)),
        };

        info!(
            event_name = "pipeline.run.completed",
            user_id,
            tasks = reply.task_ids.len(),
            intent = ?reply.intent,
            source = ?reply.source,
            "pipeline run completed"
        );
        Ok(reply)
    }

    /// Creates one stage task and returns its output if it completed.
    async fn stage(
        &self,
        input: TaskInput,
        task_ids: &mut Vec<TaskId>,
    ) -> Result<Option<TaskOutput>, AgentError> {
        let id = self.tasks.create_task(input, MessagePriority::High).await?;
        task_ids.push(id.clone());
        Ok(self
            .tasks
            .task(&id)
            .filter(|task| task.status == TaskStatus::Completed)
            .and_then(|task| task.output))
    }
}
