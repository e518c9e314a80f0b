use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use echoshop_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

struct Sources {
    path: Option<PathBuf>,
    doc: Option<Value>,
}

impl Sources {
    fn entry(&self, key: &'static str, value: impl Into<String>, env_keys: &[&str]) -> ConfigEntry {
        ConfigEntry { key, value: value.into(), source: self.field_source(key, env_keys) }
    }

    fn field_source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .path
                    .as_deref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run(options: LoadOptions) -> CommandResult {
    let explicit = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let path = detect_config_path(explicit.as_deref());
    let sources = Sources { doc: load_config_file_doc(path.as_deref()), path };

    let llm = &config.llm;
    let orchestrator = &config.orchestrator;
    let api_key = llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());

    let entries = vec![
        sources.entry("llm.provider", llm.provider.as_str(), &["ECHOSHOP_LLM_PROVIDER"]),
        sources.entry("llm.model", llm.model.as_str(), &["ECHOSHOP_LLM_MODEL"]),
        sources.entry(
            "llm.base_url",
            llm.endpoint().unwrap_or_else(|| "<unset>".to_string()),
            &["ECHOSHOP_LLM_BASE_URL"],
        ),
        sources.entry("llm.api_key", api_key, &["ECHOSHOP_LLM_API_KEY"]),
        sources.entry("llm.timeout_secs", llm.timeout_secs.to_string(), &["ECHOSHOP_LLM_TIMEOUT_SECS"]),
        sources.entry("llm.temperature", llm.temperature.to_string(), &["ECHOSHOP_LLM_TEMPERATURE"]),
        sources.entry("llm.max_tokens", llm.max_tokens.to_string(), &["ECHOSHOP_LLM_MAX_TOKENS"]),
        sources.entry(
            "orchestrator.wait_timeout_ms",
            orchestrator.wait_timeout_ms.to_string(),
            &["ECHOSHOP_ORCHESTRATOR_WAIT_TIMEOUT_MS"],
        ),
        sources.entry(
            "orchestrator.recommendation_limit",
            orchestrator.recommendation_limit.to_string(),
            &["ECHOSHOP_ORCHESTRATOR_RECOMMENDATION_LIMIT"],
        ),
        sources.entry(
            "orchestrator.history_window",
            orchestrator.history_window.to_string(),
            &["ECHOSHOP_ORCHESTRATOR_HISTORY_WINDOW"],
        ),
        sources.entry(
            "orchestrator.task_retention_secs",
            orchestrator.task_retention_secs.to_string(),
            &["ECHOSHOP_ORCHESTRATOR_TASK_RETENTION_SECS"],
        ),
        sources.entry(
            "logging.level",
            config.logging.level.as_str(),
            &["ECHOSHOP_LOGGING_LEVEL", "ECHOSHOP_LOG_LEVEL"],
        ),
        sources.entry(
            "logging.format",
            config.logging.format.as_str(),
            &["ECHOSHOP_LOGGING_FORMAT", "ECHOSHOP_LOG_FORMAT"],
        ),
    ];

    CommandResult::with_data(
        "config",
        "effective config (source precedence: env > file > default)",
        entries,
    )
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("echoshop.toml"), PathBuf::from("config/echoshop.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once(['_', '-']) {
        return format!("{prefix}_***");
    }

    "<redacted>".to_string()
}
