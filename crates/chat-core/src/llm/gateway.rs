use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ConversationTurn;

pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, LlmGatewayError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    /// System prompt, then each prior turn as a user/assistant pair oldest
    /// first, then the new prompt.
    pub fn with_history(
        system_prompt: &str,
        history: &[ConversationTurn],
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(system_prompt));
        for turn in history {
            messages.push(ChatMessage::user(&turn.prompt));
            messages.push(ChatMessage::assistant(&turn.response));
        }
        messages.push(ChatMessage::user(prompt));

        Self {
            messages,
            max_tokens,
            temperature,
        }
    }

    pub fn single_shot(system_prompt: &str, prompt: &str, max_tokens: u32, temperature: f32) -> Self {
        Self::with_history(system_prompt, &[], prompt, max_tokens, temperature)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmTokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub model: String,
    pub provider_request_id: Option<String>,
    pub content: String,
    pub usage: Option<LlmTokenUsage>,
}

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider request failed: {0}")]
    ProviderFailure(String),
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

/// Answers a prompt under a system prompt, given the prior turns of the
/// conversation oldest first.
pub trait CompletionProvider: Send + Sync {
    fn complete<'a>(
        &'a self,
        system_prompt: &'a str,
        history: &'a [ConversationTurn],
        prompt: &'a str,
    ) -> ProviderFuture<'a, String>;
}

pub trait TopicProvider: Send + Sync {
    /// Comma-separated legal topic tags for a prompt.
    fn extract_topics<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a, String>;

    fn generate_title<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a, String>;
}

pub trait SummaryProvider: Send + Sync {
    fn summarize<'a>(&'a self, turns: &'a [ConversationTurn]) -> ProviderFuture<'a, String>;
}

pub trait EmbeddingProvider: Send + Sync {
    fn embed<'a>(&'a self, text: &'a str) -> ProviderFuture<'a, Vec<f32>>;

    fn dimensions(&self) -> usize;
}
