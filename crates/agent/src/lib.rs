//! Agent orchestration runtime for EchoShop.
//!
//! One utterance runs through a fixed pipeline of stages, each executed by
//! the agent declaring the matching capability:
//!
//! 1. **Intent classification** (`llm`) - completion service with keyword fallback
//! 2. **Profile update** (`handlers`) - merge extracted preferences into the store
//! 3. **Restaurant search** - only when the utterance mentions searching
//! 4. **Order processing** (`cart`) - only when the utterance mentions ordering
//! 5. **Recommendation generation** - ranked by the personalization scorer
//! 6. **Response generation** - structured, legacy, then rule-based replies
//!
//! # Key Types
//!
//! - `AgentRuntime` - the context object the entry point builds once
//! - `TaskLifecycleManager` - task table, routing and completion notification
//! - `CompletionService` - pluggable trait for Groq/OpenAI/Ollama
//!
//! The completion service only phrases replies. Carts, scoring and profile
//! merges are deterministic and never depend on its output.

pub mod bus;
pub mod cart;
pub mod errors;
pub mod handlers;
pub mod history;
pub mod http;
pub mod lifecycle;
pub mod llm;
pub mod pipeline;
pub mod registry;
pub mod responder;
pub mod router;
pub mod runtime;
pub mod speech;

pub use errors::{AgentError, StageError};
pub use pipeline::PipelineReply;
pub use runtime::{AgentRuntime, AudioReply, SystemStatus};
