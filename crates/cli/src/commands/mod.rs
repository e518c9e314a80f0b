pub mod agents;
pub mod ask;
pub mod config;
pub mod demo;
pub mod graph;
pub mod recommend;
pub mod status;
pub mod tasks;

use echoshop_agent::http::completion_service;
use echoshop_agent::AgentRuntime;
use echoshop_core::config::{AppConfig, LoadOptions};
use echoshop_core::errors::InterfaceError;
use echoshop_core::knowledge::KnowledgeStore;
use serde::Serialize;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::with_data(command, message, Value::Null)
    }

    /// Success payload carrying a serialized result under `data`.
    pub fn with_data(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(Value::Null) => None,
            Ok(value) => Some(value),
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), EXIT_RUNTIME)
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn interface_failure(command: &str, error: &InterfaceError) -> Self {
        let error_class = match error {
            InterfaceError::BadRequest { .. } => "bad_request",
            InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
            InterfaceError::Internal { .. } => "internal",
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: format!("{} ({error})", error.user_message()),
            correlation_id: Some(error.correlation_id().to_string()),
            data: None,
        };
        Self { exit_code: EXIT_RUNTIME, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Everything a command needs to talk to the orchestrator.
pub struct Session {
    pub config: AppConfig,
    pub executor: tokio::runtime::Runtime,
    pub runtime: AgentRuntime,
}

/// Loads configuration and builds the seeded runtime, or the failure payload
/// the command should print instead.
pub fn open_session(command: &str, options: LoadOptions) -> Result<Session, CommandResult> {
    let config = AppConfig::load(options).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })?;

    let service = completion_service(&config.llm).map_err(|error| {
        CommandResult::failure(command, "completion_service", format!("{error:#}"), EXIT_RUNTIME)
    })?;

    let executor = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            )
        },
    )?;

    let runtime = AgentRuntime::new(&config.orchestrator, KnowledgeStore::seeded(), service);
    Ok(Session { config, executor, runtime })
}

/// Correlation id used in failure payloads for one command invocation.
pub fn correlation_id(command: &str) -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    format!("{command}-{id}")
}

/// Runs utterances through the pipeline so later status queries have
/// something to report.
pub fn warm_up(session: &Session, user_id: &str, utterances: &[String]) {
    for utterance in utterances {
        session.executor.block_on(session.runtime.process_utterance(user_id, utterance));
    }
}
