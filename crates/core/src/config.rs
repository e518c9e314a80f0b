use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub wait_timeout_ms: u64,
    pub recommendation_limit: usize,
    pub history_window: usize,
    pub task_retention_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Groq,
    OpenAi,
    Ollama,
    Disabled,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::Disabled => "disabled",
        }
    }

    fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Ollama | Self::Disabled => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub wait_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Disabled,
                api_key: None,
                base_url: None,
                model: "llama3-8b-8192".to_string(),
                timeout_secs: 30,
                temperature: 0.3,
                max_tokens: 200,
            },
            orchestrator: OrchestratorConfig {
                wait_timeout_ms: 10_000,
                recommendation_limit: 3,
                history_window: 4,
                task_retention_secs: 3_600,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl LlmConfig {
    /// Configured base URL, or the provider's public endpoint when unset.
    pub fn endpoint(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| self.provider.default_base_url().map(str::to_string))
            .map(|url| url.trim_end_matches('/').to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl OrchestratorConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            "disabled" | "none" => Ok(Self::Disabled),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected groq|openai|ollama|disabled)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Layers defaults, the TOML file, `ECHOSHOP_*` variables and explicit
    /// overrides, then validates the result.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => read_patch(&path)?.merge_into(&mut config),
            None if options.require_file => {
                let expected = options.config_path.unwrap_or_else(|| PathBuf::from("echoshop.toml"));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.merge_env()?;
        options.overrides.merge_into(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn merge_env(&mut self) -> Result<(), ConfigError> {
        let llm = &mut self.llm;
        if let Some(provider) = env_value::<LlmProvider>("ECHOSHOP_LLM_PROVIDER")? {
            llm.provider = provider;
        }
        if let Some(key) = read_env("ECHOSHOP_LLM_API_KEY") {
            llm.api_key = Some(secret_value(key));
        }
        llm.base_url = read_env("ECHOSHOP_LLM_BASE_URL").or(llm.base_url.take());
        if let Some(model) = read_env("ECHOSHOP_LLM_MODEL") {
            llm.model = model;
        }
        replace_with_env(&mut llm.timeout_secs, "ECHOSHOP_LLM_TIMEOUT_SECS")?;
        replace_with_env(&mut llm.temperature, "ECHOSHOP_LLM_TEMPERATURE")?;
        replace_with_env(&mut llm.max_tokens, "ECHOSHOP_LLM_MAX_TOKENS")?;

        let orchestrator = &mut self.orchestrator;
        replace_with_env(&mut orchestrator.wait_timeout_ms, "ECHOSHOP_ORCHESTRATOR_WAIT_TIMEOUT_MS")?;
        replace_with_env(
            &mut orchestrator.recommendation_limit,
            "ECHOSHOP_ORCHESTRATOR_RECOMMENDATION_LIMIT",
        )?;
        replace_with_env(&mut orchestrator.history_window, "ECHOSHOP_ORCHESTRATOR_HISTORY_WINDOW")?;
        replace_with_env(
            &mut orchestrator.task_retention_secs,
            "ECHOSHOP_ORCHESTRATOR_TASK_RETENTION_SECS",
        )?;

        // The long names win over the short aliases.
        if let Some(level) =
            read_env("ECHOSHOP_LOGGING_LEVEL").or_else(|| read_env("ECHOSHOP_LOG_LEVEL"))
        {
            self.logging.level = level;
        }
        if let Some(format) =
            read_env("ECHOSHOP_LOGGING_FORMAT").or_else(|| read_env("ECHOSHOP_LOG_FORMAT"))
        {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_orchestrator(&self.orchestrator)?;
        validate_logging(&self.logging)
    }
}

impl ConfigOverrides {
    fn merge_into(self, config: &mut AppConfig) {
        set_some(&mut config.logging.level, self.log_level);
        set_some(&mut config.logging.format, self.log_format);
        set_some(&mut config.llm.provider, self.llm_provider);
        set_some(&mut config.llm.model, self.llm_model);
        if let Some(key) = self.llm_api_key {
            config.llm.api_key = Some(secret_value(key));
        }
        set_some(&mut config.orchestrator.wait_timeout_ms, self.wait_timeout_ms);
    }
}

fn set_some<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("echoshop.toml"), PathBuf::from("config/echoshop.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::Groq | LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(format!(
                    "llm.api_key is required for the {} provider (set ECHOSHOP_LLM_API_KEY)",
                    llm.provider.as_str()
                )));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for ollama provider (e.g. http://localhost:11434/v1)"
                        .to_string(),
                ));
            }
        }
        LlmProvider::Disabled => {}
    }

    if let Some(base_url) = &llm.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_orchestrator(orchestrator: &OrchestratorConfig) -> Result<(), ConfigError> {
    if orchestrator.wait_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "orchestrator.wait_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if orchestrator.recommendation_limit == 0 {
        return Err(ConfigError::Validation(
            "orchestrator.recommendation_limit must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_value<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    let Some(raw) = read_env(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_string(), value: raw })
}

fn replace_with_env<T: std::str::FromStr>(slot: &mut T, key: &str) -> Result<(), ConfigError> {
    set_some(slot, env_value(key)?);
    Ok(())
}

/// Sparse view of `echoshop.toml`; absent keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    orchestrator: Option<OrchestratorPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct OrchestratorPatch {
    wait_timeout_ms: Option<u64>,
    recommendation_limit: Option<usize>,
    history_window: Option<usize>,
    task_retention_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl ConfigPatch {
    fn merge_into(self, config: &mut AppConfig) {
        if let Some(llm) = self.llm {
            let target = &mut config.llm;
            set_some(&mut target.provider, llm.provider);
            if let Some(key) = llm.api_key {
                target.api_key = Some(secret_value(key));
            }
            target.base_url = llm.base_url.or(target.base_url.take());
            set_some(&mut target.model, llm.model);
            set_some(&mut target.timeout_secs, llm.timeout_secs);
            set_some(&mut target.temperature, llm.temperature);
            set_some(&mut target.max_tokens, llm.max_tokens);
        }

        if let Some(orchestrator) = self.orchestrator {
            let target = &mut config.orchestrator;
            set_some(&mut target.wait_timeout_ms, orchestrator.wait_timeout_ms);
            set_some(&mut target.recommendation_limit, orchestrator.recommendation_limit);
            set_some(&mut target.history_window, orchestrator.history_window);
            set_some(&mut target.task_retention_secs, orchestrator.task_retention_secs);
        }

        if let Some(logging) = self.logging {
            set_some(&mut config.logging.level, logging.level);
            set_some(&mut config.logging.format, logging.format);
        }
    }
}
