//! Bounded context window over the append-only summary log of a session.
//!
//! Summaries are never deleted here. "Eviction" only means a summary falls
//! out of the `previous_summaries` list once enough newer ones exist.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::ChatServiceConfig;
use crate::context_window::{ContextWindow, ContextWindowError};
use crate::llm::{EmbeddingProvider, LlmGatewayError, SummaryProvider, embed_or_zero};
use crate::models::{ConversationTurn, NewSummary, Session, Summary};
use crate::repos::{ChatStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryTrigger {
    /// Summarize after every message once the threshold is reached.
    EveryTurnAfterThreshold,
    /// Summarize only when the message count is a multiple of the threshold.
    Periodic,
}

impl SummaryTrigger {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "threshold" => Some(Self::EveryTurnAfterThreshold),
            "periodic" => Some(Self::Periodic),
            _ => None,
        }
    }

    pub fn fires(self, message_count: usize, threshold: usize) -> bool {
        if threshold == 0 || message_count < threshold {
            return false;
        }

        match self {
            Self::EveryTurnAfterThreshold => true,
            Self::Periodic => message_count % threshold == 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("need {required} turns to summarize, found {available}")]
    BelowThreshold { required: usize, available: usize },
    #[error("summary provider failed: {0}")]
    Provider(#[from] LlmGatewayError),
    #[error("summary store failed: {0}")]
    Store(#[from] StoreError),
    #[error("malformed context window: {0}")]
    MalformedData(#[from] ContextWindowError),
    #[error("{0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone)]
pub struct SummaryPolicy {
    pub threshold: usize,
    pub turns: usize,
    pub trigger: SummaryTrigger,
    pub max_previous: usize,
    pub jurisdiction: String,
}

impl From<&ChatServiceConfig> for SummaryPolicy {
    fn from(config: &ChatServiceConfig) -> Self {
        Self {
            threshold: config.summary_threshold,
            turns: config.summary_turns,
            trigger: config.summary_trigger,
            max_previous: config.max_previous_summaries,
            jurisdiction: config.default_jurisdiction.clone(),
        }
    }
}

impl Default for SummaryPolicy {
    fn default() -> Self {
        Self::from(&ChatServiceConfig::default())
    }
}

#[derive(Clone)]
pub struct SummaryCache {
    store: Arc<dyn ChatStore>,
    summarizer: Arc<dyn SummaryProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    policy: SummaryPolicy,
}

impl SummaryCache {
    pub fn new(
        store: Arc<dyn ChatStore>,
        summarizer: Arc<dyn SummaryProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        policy: SummaryPolicy,
    ) -> Self {
        Self {
            store,
            summarizer,
            embedder,
            policy,
        }
    }

    pub fn policy(&self) -> &SummaryPolicy {
        &self.policy
    }

    pub fn should_summarize(&self, message_count: usize) -> bool {
        self.policy
            .trigger
            .fires(message_count, self.policy.threshold)
    }

    /// Summarizes the most recent turns of a session and stores the result.
    /// Fewer turns than the configured span is refused.
    pub async fn summarize(&self, session_id: Uuid) -> Result<Summary, SummaryError> {
        let messages = self.store.list_messages(session_id).await?;
        let required = self.policy.turns;
        if messages.len() < required {
            return Err(SummaryError::BelowThreshold {
                required,
                available: messages.len(),
            });
        }

        let turns = messages[messages.len() - required..]
            .iter()
            .map(|message| message.as_turn())
            .collect::<Vec<ConversationTurn>>();

        let summary_text = self.summarizer.summarize(&turns).await?;
        let embedding = embed_or_zero(self.embedder.as_ref(), &summary_text).await;

        let summary = self
            .store
            .insert_summary(NewSummary {
                session_id,
                summary_text,
                embedding: Some(embedding),
                created_at: Utc::now(),
            })
            .await?;

        debug!(session_id = %session_id, summary_id = %summary.id, "summary stored");
        Ok(summary)
    }

    /// Points the session's context window at `newest` and keeps up to
    /// `max_previous` older summaries behind it.
    pub async fn update_window(
        &self,
        session_id: Uuid,
        newest: Uuid,
    ) -> Result<ContextWindow, SummaryError> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| SummaryError::NotFound(format!("session {session_id}")))?;

        let recent = self
            .store
            .recent_summaries(session_id, self.policy.max_previous + 1)
            .await?
            .into_iter()
            .map(|summary| summary.id)
            .collect::<Vec<_>>();

        let window = ContextWindow::advance(
            newest,
            &recent,
            self.policy.max_previous,
            &self.policy.jurisdiction,
            &session.legal_topics,
        );

        if !self
            .store
            .update_context_window(session_id, window.to_json())
            .await?
        {
            return Err(SummaryError::NotFound(format!("session {session_id}")));
        }

        Ok(window)
    }

    /// Summarizes and advances the window in one step.
    pub async fn append(&self, session_id: Uuid) -> Result<Summary, SummaryError> {
        let summary = self.summarize(session_id).await?;
        self.update_window(session_id, summary.id).await?;
        info!(session_id = %session_id, summary_id = %summary.id, "context window advanced");
        Ok(summary)
    }

    /// Best-effort [`append`](Self::append): failures are logged, never returned.
    pub async fn append_logged(&self, session_id: Uuid) -> Option<Summary> {
        match self.append(session_id).await {
            Ok(summary) => Some(summary),
            Err(err) => {
                error!(session_id = %session_id, error = %err, "summarization failed");
                None
            }
        }
    }

    /// Resolves the summary named by the session's `current_focus`.
    pub async fn get_active_summary(&self, session: &Session) -> Result<Summary, SummaryError> {
        let window = ContextWindow::parse(&session.context_window)?;
        let focus = window
            .current_focus
            .ok_or_else(|| SummaryError::NotFound("context window focus".to_string()))?;

        self.store
            .get_summary(focus)
            .await?
            .ok_or_else(|| SummaryError::NotFound(format!("summary {focus}")))
    }
}
