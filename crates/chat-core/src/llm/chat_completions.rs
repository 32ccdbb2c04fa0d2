use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{ConfigError, LlmProviderConfig};
use crate::fallbacks::{normalize_title, normalize_topics};
use crate::models::ConversationTurn;

use super::gateway::{
    CompletionProvider, CompletionRequest, CompletionResponse, LlmGatewayError, LlmTokenUsage,
    ProviderFuture, SummaryProvider, TopicProvider,
};
use super::prompts::{
    SESSION_TITLE_PROMPT, SUMMARY_MAX_TOKENS, SUMMARY_PROMPT, SUMMARY_TEMPERATURE,
    TITLE_MAX_TOKENS, TITLE_TEMPERATURE, TOPIC_CLASSIFIER_PROMPT, TOPIC_MAX_TOKENS,
    TOPIC_TEMPERATURE, summary_user_prompt,
};

/// OpenAI-compatible `/chat/completions` client backing every text provider
/// role: answers, topic tags, titles and summaries.
#[derive(Clone)]
pub struct ChatCompletionsGateway {
    client: reqwest::Client,
    config: LlmProviderConfig,
}

impl ChatCompletionsGateway {
    pub fn new(config: LlmProviderConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmProviderConfig {
        &self.config
    }

    pub async fn send(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmGatewayError> {
        let mut attempt = 0_u32;

        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if err.retryable && attempt < self.config.max_retries {
                        let backoff_multiplier = 2_u64.saturating_pow(attempt);
                        let backoff_ms = self
                            .config
                            .retry_base_backoff_ms
                            .saturating_mul(backoff_multiplier);
                        debug!(attempt, backoff_ms, error = %err.error, "retrying chat completion");
                        sleep(Duration::from_millis(backoff_ms)).await;
                        attempt = attempt.saturating_add(1);
                        continue;
                    }

                    return Err(err.error);
                }
            }
        }
    }

    async fn send_once(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, SendAttemptError> {
        let request_body = json!({
            "model": self.config.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(&self.config.chat_completions_url)
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SendAttemptError::retryable(LlmGatewayError::Timeout)
                } else {
                    SendAttemptError::retryable(LlmGatewayError::ProviderFailure(
                        "request_unavailable".to_string(),
                    ))
                }
            })?;

        let status = response.status();
        let header_request_id = header_request_id(response.headers());
        let body = response.text().await.map_err(|_| {
            SendAttemptError::non_retryable(LlmGatewayError::InvalidProviderPayload(
                "response_body_read_failed".to_string(),
            ))
        })?;

        if !status.is_success() {
            let provider_code = parse_provider_error_code(&body);
            return Err(SendAttemptError {
                error: LlmGatewayError::ProviderFailure(format!(
                    "status={} code={provider_code}",
                    status.as_u16()
                )),
                retryable: is_retryable_status(status),
            });
        }

        let parsed: ChatCompletionsSuccessResponse =
            serde_json::from_str(&body).map_err(|_| {
                SendAttemptError::non_retryable(LlmGatewayError::InvalidProviderPayload(
                    "response_json_parse_failed".to_string(),
                ))
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                SendAttemptError::non_retryable(LlmGatewayError::InvalidProviderPayload(
                    "missing_choice".to_string(),
                ))
            })?
            .message
            .content
            .unwrap_or_default();

        Ok(CompletionResponse {
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            provider_request_id: header_request_id.or(parsed.id),
            content,
            usage: parsed.usage.map(|usage| LlmTokenUsage {
                prompt_tokens: clamp_u64_to_u32(usage.prompt_tokens.unwrap_or(0)),
                completion_tokens: clamp_u64_to_u32(usage.completion_tokens.unwrap_or(0)),
                total_tokens: clamp_u64_to_u32(usage.total_tokens.unwrap_or(0)),
            }),
        })
    }

    async fn complete_text(&self, request: CompletionRequest) -> Result<String, LlmGatewayError> {
        let response = self.send(&request).await?;
        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "chat completion finished"
            );
        }
        Ok(response.content)
    }
}

impl CompletionProvider for ChatCompletionsGateway {
    fn complete<'a>(
        &'a self,
        system_prompt: &'a str,
        history: &'a [ConversationTurn],
        prompt: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let request = CompletionRequest::with_history(
                system_prompt,
                history,
                prompt,
                self.config.max_tokens,
                self.config.temperature,
            );
            self.complete_text(request).await
        })
    }
}

impl TopicProvider for ChatCompletionsGateway {
    fn extract_topics<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let request = CompletionRequest::single_shot(
                TOPIC_CLASSIFIER_PROMPT,
                prompt,
                TOPIC_MAX_TOKENS,
                TOPIC_TEMPERATURE,
            );
            let raw = self.complete_text(request).await?;
            Ok(normalize_topics(&raw))
        })
    }

    fn generate_title<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let request = CompletionRequest::single_shot(
                SESSION_TITLE_PROMPT,
                prompt,
                TITLE_MAX_TOKENS,
                TITLE_TEMPERATURE,
            );
            let raw = self.complete_text(request).await?;
            Ok(normalize_title(&raw))
        })
    }
}

impl SummaryProvider for ChatCompletionsGateway {
    fn summarize<'a>(&'a self, turns: &'a [ConversationTurn]) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            if turns.is_empty() {
                return Err(LlmGatewayError::InvalidProviderPayload(
                    "no_turns_to_summarize".to_string(),
                ));
            }

            let request = CompletionRequest::single_shot(
                SUMMARY_PROMPT,
                &summary_user_prompt(turns),
                SUMMARY_MAX_TOKENS,
                SUMMARY_TEMPERATURE,
            );
            let summary = self.complete_text(request).await?;
            let trimmed = summary.trim();
            if trimmed.is_empty() {
                warn!("summary provider returned empty text");
                return Err(LlmGatewayError::InvalidProviderPayload(
                    "empty_summary".to_string(),
                ));
            }

            Ok(trimmed.to_string())
        })
    }
}

#[derive(Debug)]
struct SendAttemptError {
    error: LlmGatewayError,
    retryable: bool,
}

impl SendAttemptError {
    fn retryable(error: LlmGatewayError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn non_retryable(error: LlmGatewayError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsSuccessResponse {
    id: Option<String>,
    model: Option<String>,
    choices: Vec<ChatCompletionsChoice>,
    usage: Option<ChatCompletionsUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsChoice {
    message: ChatCompletionsMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

pub(super) fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn header_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

pub(super) fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        code: Option<Value>,
    }

    let parsed = serde_json::from_str::<ProviderErrorEnvelope>(body).ok();
    let Some(provider_error_code) = parsed
        .and_then(|envelope| envelope.error)
        .and_then(|details| details.code)
    else {
        return "unknown".to_string();
    };

    match provider_error_code {
        Value::String(code) => code,
        Value::Number(code) => code.to_string(),
        _ => "unknown".to_string(),
    }
}

fn clamp_u64_to_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
