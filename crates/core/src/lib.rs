pub mod config;
pub mod domain;
pub mod errors;
pub mod knowledge;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, LlmProvider};
pub use domain::agent::{Agent, AgentId, Capability};
pub use domain::cart::{CartItem, OrderResult, OrderStatus};
pub use domain::intent::{CompletionReply, Intent, IntentScore, ReplyEntities, ReplySource};
pub use domain::message::{AgentMessage, MessageId, MessageKind, MessagePayload, MessagePriority};
pub use domain::task::{AgentTask, StageContext, TaskId, TaskInput, TaskKind, TaskOutput, TaskStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError, KnowledgeError};
pub use knowledge::{KnowledgeStore, Recommendation, UserProfile};
