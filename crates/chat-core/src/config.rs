use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::config_env::{
    optional_trimmed_env, parse_bool_env, parse_f32_env, parse_u32_env, parse_u64_env,
    parse_usize_env, require_env, require_http_url,
};
use crate::llm::prompts::LEGAL_ASSISTANT_SYSTEM_PROMPT;
use crate::models::DEFAULT_JURISDICTION;
use crate::summary_cache::SummaryTrigger;

const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "deepseek-chat";
const DEFAULT_MAX_TOKENS: u32 = 2048;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 250;

const DEFAULT_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_EMBEDDINGS_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
const DEFAULT_EMBEDDINGS_TIMEOUT_MS: u64 = 15_000;

pub const DEFAULT_SUMMARY_THRESHOLD: usize = 4;
pub const DEFAULT_SUMMARY_TURNS: usize = 4;
pub const DEFAULT_PREVIOUS_SUMMARIES: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid number in env var {0}")]
    ParseFloat(String),
    #[error("invalid boolean in env var {0}")]
    ParseBool(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub chat_completions_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_backoff_ms: u64,
}

impl LlmProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let chat_completions_url = optional_trimmed_env("LLM_CHAT_COMPLETIONS_URL")
            .unwrap_or_else(|| DEFAULT_CHAT_COMPLETIONS_URL.to_string());

        Ok(Self {
            chat_completions_url: require_http_url(
                "LLM_CHAT_COMPLETIONS_URL",
                chat_completions_url,
            )?,
            api_key: require_env("LLM_API_KEY")?,
            model: optional_trimmed_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: parse_u32_env("LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            temperature: parse_f32_env("LLM_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            timeout_ms: parse_u64_env("LLM_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            max_retries: parse_u32_env("LLM_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_base_backoff_ms: parse_u64_env(
                "LLM_RETRY_BASE_BACKOFF_MS",
                DEFAULT_RETRY_BASE_BACKOFF_MS,
            )?,
        })
    }

    /// Reference settings against an explicit endpoint, used by tests and
    /// local tooling.
    pub fn for_endpoint(chat_completions_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            chat_completions_url: chat_completions_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_backoff_ms: DEFAULT_RETRY_BASE_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub embeddings_url: String,
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub timeout_ms: u64,
}

impl EmbeddingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let embeddings_url = optional_trimmed_env("EMBEDDINGS_URL")
            .unwrap_or_else(|| DEFAULT_EMBEDDINGS_URL.to_string());
        let api_key = match optional_trimmed_env("EMBEDDINGS_API_KEY") {
            Some(key) => key,
            None => require_env("LLM_API_KEY")?,
        };
        let dimensions = parse_usize_env("EMBEDDING_DIMENSIONS", DEFAULT_EMBEDDING_DIMENSIONS)?;
        if dimensions == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "EMBEDDING_DIMENSIONS must be > 0".to_string(),
            ));
        }

        Ok(Self {
            embeddings_url: require_http_url("EMBEDDINGS_URL", embeddings_url)?,
            api_key,
            model: optional_trimmed_env("EMBEDDINGS_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDINGS_MODEL.to_string()),
            dimensions,
            timeout_ms: parse_u64_env("EMBEDDINGS_TIMEOUT_MS", DEFAULT_EMBEDDINGS_TIMEOUT_MS)?,
        })
    }

    pub fn for_endpoint(embeddings_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            embeddings_url: embeddings_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_EMBEDDINGS_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            timeout_ms: DEFAULT_EMBEDDINGS_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatServiceConfig {
    pub summary_threshold: usize,
    pub summary_turns: usize,
    pub summary_trigger: SummaryTrigger,
    pub max_previous_summaries: usize,
    pub summarize_in_background: bool,
    pub default_jurisdiction: String,
    /// Sent ahead of every conversational completion.
    pub system_prompt: String,
}

impl Default for ChatServiceConfig {
    fn default() -> Self {
        Self {
            summary_threshold: DEFAULT_SUMMARY_THRESHOLD,
            summary_turns: DEFAULT_SUMMARY_TURNS,
            summary_trigger: SummaryTrigger::EveryTurnAfterThreshold,
            max_previous_summaries: DEFAULT_PREVIOUS_SUMMARIES,
            summarize_in_background: true,
            default_jurisdiction: DEFAULT_JURISDICTION.to_string(),
            system_prompt: LEGAL_ASSISTANT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ChatServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let summary_threshold = parse_usize_env("SUMMARY_THRESHOLD", DEFAULT_SUMMARY_THRESHOLD)?;
        let summary_turns = parse_usize_env("SUMMARY_TURNS", DEFAULT_SUMMARY_TURNS)?;
        if summary_threshold == 0 || summary_turns == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "SUMMARY_THRESHOLD and SUMMARY_TURNS must be > 0".to_string(),
            ));
        }

        let summary_trigger = match optional_trimmed_env("SUMMARY_TRIGGER") {
            Some(raw) => SummaryTrigger::parse(&raw).ok_or_else(|| {
                ConfigError::InvalidConfiguration(format!(
                    "SUMMARY_TRIGGER must be 'threshold' or 'periodic', got '{raw}'"
                ))
            })?,
            None => SummaryTrigger::EveryTurnAfterThreshold,
        };

        Ok(Self {
            summary_threshold,
            summary_turns,
            summary_trigger,
            max_previous_summaries: parse_usize_env(
                "CONTEXT_WINDOW_PREVIOUS_SUMMARIES",
                DEFAULT_PREVIOUS_SUMMARIES,
            )?,
            summarize_in_background: parse_bool_env("SUMMARIZE_IN_BACKGROUND", true)?,
            default_jurisdiction: optional_trimmed_env("DEFAULT_JURISDICTION")
                .unwrap_or_else(|| DEFAULT_JURISDICTION.to_string()),
            system_prompt: optional_trimmed_env("LLM_SYSTEM_PROMPT")
                .unwrap_or_else(|| LEGAL_ASSISTANT_SYSTEM_PROMPT.to_string()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub migrations_dir: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require_env("DATABASE_URL")?,
            database_max_connections: parse_u32_env("DATABASE_MAX_CONNECTIONS", 10)?,
            migrations_dir: env::var("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../db/migrations")
                }),
        })
    }
}
