//! OpenAI-compatible chat-completions adapter (Groq, OpenAI, Ollama).

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use echoshop_core::config::{LlmConfig, LlmProvider};

use crate::llm::{CompletionRequest, CompletionService, DisabledCompletionService, INTENT_PROMPT};

const INTENT_TEMPERATURE: f32 = 0.1;
const INTENT_MAX_TOKENS: u32 = 50;

pub struct HttpCompletionClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpCompletionClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint()
            .ok_or_else(|| anyhow!("no endpoint configured for the {} provider", config.provider.as_str()))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage<'_>>,
        json_output: bool,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens,
            response_format: json_output.then(|| json!({ "type": "json_object" })),
        };

        debug!(url = %url, model = %self.model, json_output, "calling completion endpoint");

        let mut request = self.client.post(&url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.context("completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion endpoint returned {status}: {detail}"));
        }

        let parsed: ChatResponse =
            response.json().await.context("completion response was not valid JSON")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("completion response had no content"))
    }
}

fn conversation<'a>(request: &'a CompletionRequest) -> Vec<ChatMessage<'a>> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ChatMessage { role: "system", content: &request.system });
    messages.extend(request.history.iter().map(|turn| ChatMessage {
        role: turn.role.as_str(),
        content: &turn.content,
    }));
    messages.push(ChatMessage { role: "user", content: &request.utterance });
    messages
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.chat(conversation(request), true, self.temperature, self.max_tokens).await
    }

    async fn complete_legacy(&self, request: &CompletionRequest) -> Result<String> {
        self.chat(conversation(request), false, self.temperature, self.max_tokens).await
    }

    async fn classify_intent(&self, utterance: &str) -> Result<String> {
        let messages = vec![
            ChatMessage { role: "system", content: INTENT_PROMPT },
            ChatMessage { role: "user", content: utterance },
        ];
        self.chat(messages, true, INTENT_TEMPERATURE, INTENT_MAX_TOKENS).await
    }
}

/// The completion service selected by configuration.
pub fn completion_service(config: &LlmConfig) -> Result<Arc<dyn CompletionService>> {
    match config.provider {
        LlmProvider::Disabled => Ok(Arc::new(DisabledCompletionService)),
        LlmProvider::Groq | LlmProvider::OpenAi | LlmProvider::Ollama => {
            Ok(Arc::new(HttpCompletionClient::from_config(config)?))
        }
    }
}
