use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::cart::OrderResult;
use crate::domain::intent::{CompletionReply, IntentScore};
use crate::errors::DomainError;
use crate::knowledge::Recommendation;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn generate() -> Self {
        Self(format!("task_{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    VoiceInput,
    IntentClassification,
    ProfileUpdate,
    RestaurantSearch,
    OrderProcessing,
    RecommendationGeneration,
    ResponseGeneration,
}

impl TaskKind {
    pub const ALL: [TaskKind; 7] = [
        TaskKind::VoiceInput,
        TaskKind::IntentClassification,
        TaskKind::ProfileUpdate,
        TaskKind::RestaurantSearch,
        TaskKind::OrderProcessing,
        TaskKind::RecommendationGeneration,
        TaskKind::ResponseGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VoiceInput => "VOICE_INPUT",
            Self::IntentClassification => "INTENT_CLASSIFICATION",
            Self::ProfileUpdate => "PROFILE_UPDATE",
            Self::RestaurantSearch => "RESTAURANT_SEARCH",
            Self::OrderProcessing => "ORDER_PROCESSING",
            Self::RecommendationGeneration => "RECOMMENDATION_GENERATION",
            Self::ResponseGeneration => "RESPONSE_GENERATION",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

/// Outputs of earlier stages handed to response generation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StageContext {
    pub intent: Option<IntentScore>,
    pub search_results: Option<Vec<Recommendation>>,
    pub order: Option<OrderResult>,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskInput {
    VoiceInput {
        transcript: String,
    },
    IntentClassification {
        utterance: String,
    },
    ProfileUpdate {
        user_id: String,
        utterance: String,
    },
    RestaurantSearch {
        user_id: String,
    },
    OrderProcessing {
        user_id: String,
        utterance: String,
        search_results: Option<Vec<Recommendation>>,
    },
    RecommendationGeneration {
        user_id: String,
    },
    ResponseGeneration {
        user_id: String,
        utterance: String,
        context: StageContext,
    },
}

impl TaskInput {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::VoiceInput { .. } => TaskKind::VoiceInput,
            Self::IntentClassification { .. } => TaskKind::IntentClassification,
            Self::ProfileUpdate { .. } => TaskKind::ProfileUpdate,
            Self::RestaurantSearch { .. } => TaskKind::RestaurantSearch,
            Self::OrderProcessing { .. } => TaskKind::OrderProcessing,
            Self::RecommendationGeneration { .. } => TaskKind::RecommendationGeneration,
            Self::ResponseGeneration { .. } => TaskKind::ResponseGeneration,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutput {
    VoiceInput { transcript: String },
    IntentClassification(IntentScore),
    ProfileUpdate { preferences: Vec<String>, dietary: Vec<String> },
    RestaurantSearch { restaurants: Vec<Recommendation> },
    OrderProcessing(OrderResult),
    RecommendationGeneration { recommendations: Vec<Recommendation> },
    ResponseGeneration(CompletionReply),
}

impl TaskOutput {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::VoiceInput { .. } => TaskKind::VoiceInput,
            Self::IntentClassification(_) => TaskKind::IntentClassification,
            Self::ProfileUpdate { .. } => TaskKind::ProfileUpdate,
            Self::RestaurantSearch { .. } => TaskKind::RestaurantSearch,
            Self::OrderProcessing(_) => TaskKind::OrderProcessing,
            Self::RecommendationGeneration { .. } => TaskKind::RecommendationGeneration,
            Self::ResponseGeneration(_) => TaskKind::ResponseGeneration,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub input: TaskInput,
    pub output: Option<TaskOutput>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_agent: Option<AgentId>,
}

impl AgentTask {
    pub fn new(input: TaskInput) -> Self {
        Self {
            id: TaskId::generate(),
            kind: input.kind(),
            status: TaskStatus::Pending,
            input,
            output: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
            assigned_agent: None,
        }
    }

    pub fn start(&mut self, agent: AgentId) -> Result<(), DomainError> {
        self.transition_to(TaskStatus::InProgress)?;
        self.assigned_agent = Some(agent);
        Ok(())
    }

    pub fn complete(&mut self, output: TaskOutput) -> Result<(), DomainError> {
        if output.kind() != self.kind {
            return Err(DomainError::InvariantViolation(format!(
                "task {} of kind {} cannot take {} output",
                self.id,
                self.kind,
                output.kind()
            )));
        }
        self.transition_to(TaskStatus::Completed)?;
        self.output = Some(output);
        self.completed_at = Some(self.finished_now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), DomainError> {
        self.transition_to(TaskStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(self.finished_now());
        Ok(())
    }

    fn transition_to(&mut self, next: TaskStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidTaskTransition { from: self.status, to: next })
    }

    // completed_at never precedes created_at, even if the wall clock steps back
    fn finished_now(&self) -> DateTime<Utc> {
        Utc::now().max(self.created_at)
    }
}
