//! Session lifecycle: creation, messaging, closing and cascading deletion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::augmentation::AugmentationEngine;
use crate::citations::{CitationPipeline, citations_to_metadata};
use crate::config::ChatServiceConfig;
use crate::fallbacks::{title_or_default, topics_or_default};
use crate::llm::{
    CompletionProvider, EmbeddingProvider, LlmGatewayError, SummaryProvider, TopicProvider,
};
use crate::models::{ChatResponse, ConversationTurn, MessageView, NewMessage, Session, SessionDetail};
use crate::repos::{ChatStore, StoreError};
use crate::summary_cache::{SummaryCache, SummaryPolicy};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid session state: {0}")]
    InvalidState(String),
    #[error("provider error: {0}")]
    Provider(#[from] LlmGatewayError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// External collaborators consumed by [`ChatService`].
#[derive(Clone)]
pub struct ChatProviders {
    pub completions: Arc<dyn CompletionProvider>,
    pub topics: Arc<dyn TopicProvider>,
    pub summarizer: Arc<dyn SummaryProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

impl ChatProviders {
    /// Uses one text provider for every text role plus a separate embedder.
    pub fn new<T, E>(text: Arc<T>, embedder: Arc<E>) -> Self
    where
        T: CompletionProvider + TopicProvider + SummaryProvider + 'static,
        E: EmbeddingProvider + 'static,
    {
        Self {
            completions: text.clone(),
            topics: text.clone(),
            summarizer: text,
            embedder,
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    completions: Arc<dyn CompletionProvider>,
    topics: Arc<dyn TopicProvider>,
    summaries: SummaryCache,
    augmentation: AugmentationEngine,
    citations: CitationPipeline,
    config: ChatServiceConfig,
    session_locks: Arc<Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        providers: ChatProviders,
        citations: CitationPipeline,
        config: ChatServiceConfig,
    ) -> Self {
        let summaries = SummaryCache::new(
            store.clone(),
            providers.summarizer,
            providers.embedder,
            SummaryPolicy::from(&config),
        );

        Self {
            store,
            completions: providers.completions,
            topics: providers.topics,
            augmentation: AugmentationEngine::new(summaries.clone()),
            summaries,
            citations,
            config,
            session_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn summaries(&self) -> &SummaryCache {
        &self.summaries
    }

    pub async fn create_session(&self, user_id: Uuid) -> Result<Session, ChatError> {
        self.create_session_for_document(user_id, None).await
    }

    pub async fn create_session_for_document(
        &self,
        user_id: Uuid,
        document_id: Option<Uuid>,
    ) -> Result<Session, ChatError> {
        let mut session = Session::new(user_id, Utc::now());
        session.document_id = document_id;
        session
            .analysis_parameters
            .jurisdiction
            .clone_from(&self.config.default_jurisdiction);

        let session = self.store.insert_session(session).await?;
        info!(session_id = %session.id, user_id = %user_id, "chat session created");
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<SessionDetail, ChatError> {
        let session = self.require_session(session_id).await?;
        let messages = self.store.list_messages(session_id).await?;

        Ok(SessionDetail {
            state: session.state(messages.len()),
            messages: messages.iter().map(MessageView::from).collect(),
            session,
        })
    }

    /// Sessions owned by the user, newest first.
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, ChatError> {
        Ok(self.store.list_sessions(user_id).await?)
    }

    /// Marks the session read-only. Returns `false` when it does not exist.
    pub async fn close_session(&self, session_id: Uuid) -> Result<bool, ChatError> {
        let closed = self.store.set_session_active(session_id, false).await?;
        if closed {
            info!(session_id = %session_id, "chat session closed");
        } else {
            debug!(session_id = %session_id, "close requested for unknown session");
        }
        Ok(closed)
    }

    pub async fn send_message(
        &self,
        session_id: Uuid,
        prompt: &str,
    ) -> Result<ChatResponse, ChatError> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let session = self.require_session(session_id).await?;
        if !session.is_active {
            return Err(ChatError::InvalidState(format!(
                "session {session_id} is closed"
            )));
        }

        let history = self
            .store
            .list_messages(session_id)
            .await?
            .iter()
            .map(|message| message.as_turn())
            .collect::<Vec<ConversationTurn>>();

        let session = if history.is_empty() {
            self.tag_new_session(session, prompt).await?
        } else {
            session
        };

        let augmented = self.augmentation.augment(prompt, &session).await;
        let response = self
            .completions
            .complete(&self.config.system_prompt, &history, &augmented)
            .await?;
        let sources = self.citations.process(&response);

        let message = self
            .store
            .insert_message(NewMessage {
                session_id,
                prompt: prompt.to_string(),
                response: response.clone(),
                metadata: citations_to_metadata(&sources),
                created_at: Utc::now(),
            })
            .await?;
        debug!(
            session_id = %session_id,
            sequence_number = message.sequence_number,
            citations = sources.len(),
            "message stored"
        );

        let message_count = history.len() + 1;
        if self.summaries.should_summarize(message_count) {
            self.trigger_summary(session_id).await;
        }

        Ok(ChatResponse {
            session_id,
            message_id: message.id,
            sequence_number: message.sequence_number,
            response,
            sources,
            timestamp: message.created_at,
        })
    }

    /// Removes a session after its messages and summaries. Returns `false`
    /// when the session does not exist.
    pub async fn delete_session(&self, session_id: Uuid) -> Result<bool, ChatError> {
        if self.store.get_session(session_id).await?.is_none() {
            return Ok(false);
        }

        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let ids = [session_id];
        let messages = self.store.delete_messages_for_sessions(&ids).await?;
        let summaries = self.store.delete_summaries_for_sessions(&ids).await?;
        let deleted = self.store.delete_session(session_id).await?;

        info!(
            session_id = %session_id,
            messages,
            summaries,
            "chat session deleted"
        );
        self.forget_session_lock(session_id);
        Ok(deleted)
    }

    /// Removes every session of a user, children first. Returns `false` when
    /// the user has no sessions.
    pub async fn delete_all_sessions(&self, user_id: Uuid) -> Result<bool, ChatError> {
        let session_ids = self
            .store
            .list_sessions(user_id)
            .await?
            .into_iter()
            .map(|session| session.id)
            .collect::<Vec<_>>();
        if session_ids.is_empty() {
            return Ok(false);
        }

        // Locks are always taken in ascending id order.
        let mut locked_ids = session_ids.clone();
        locked_ids.sort_unstable();
        let locks = locked_ids
            .iter()
            .map(|session_id| self.session_lock(*session_id))
            .collect::<Vec<_>>();
        let mut guards = Vec::with_capacity(locks.len());
        for lock in &locks {
            guards.push(lock.lock().await);
        }

        let messages = self.store.delete_messages_for_sessions(&session_ids).await?;
        let summaries = self
            .store
            .delete_summaries_for_sessions(&session_ids)
            .await?;
        let sessions = self.store.delete_sessions_for_user(user_id).await?;

        info!(
            user_id = %user_id,
            sessions,
            messages,
            summaries,
            "all chat sessions deleted"
        );
        drop(guards);
        for session_id in session_ids {
            self.forget_session_lock(session_id);
        }
        Ok(sessions > 0)
    }

    /// Topic tags and title, derived once from the first prompt.
    async fn tag_new_session(&self, mut session: Session, prompt: &str) -> Result<Session, ChatError> {
        let legal_topics = topics_or_default(self.topics.extract_topics(prompt).await);
        let title = title_or_default(self.topics.generate_title(prompt).await);

        if !self
            .store
            .update_session_details(session.id, legal_topics.clone(), title.clone())
            .await?
        {
            return Err(ChatError::NotFound(format!("session {}", session.id)));
        }

        debug!(session_id = %session.id, topics = %legal_topics, "session tagged");
        session.legal_topics = legal_topics;
        session.title = Some(title);
        Ok(session)
    }

    /// Runs under the session lock: inline callers already hold it and the
    /// background task takes it before touching the summary log.
    async fn trigger_summary(&self, session_id: Uuid) {
        if self.config.summarize_in_background {
            let store = self.store.clone();
            let summaries = self.summaries.clone();
            let lock = self.session_lock(session_id);
            tokio::spawn(async move {
                let _guard = lock.lock().await;
                match store.get_session(session_id).await {
                    Ok(Some(_)) => {
                        summaries.append_logged(session_id).await;
                    }
                    Ok(None) => {
                        debug!(session_id = %session_id, "session removed before summarization");
                    }
                    Err(err) => {
                        error!(session_id = %session_id, error = %err, "summarization skipped");
                    }
                }
            });
        } else {
            self.summaries.append_logged(session_id).await;
        }
    }

    async fn require_session(&self, session_id: Uuid) -> Result<Session, ChatError> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("session {session_id}")))
    }

    fn session_lock(&self, session_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .session_locks
            .lock()
            .expect("session lock registry mutex should not be poisoned");
        locks.retain(|id, lock| *id == session_id || Arc::strong_count(lock) > 1);
        locks.entry(session_id).or_default().clone()
    }

    fn forget_session_lock(&self, session_id: Uuid) {
        self.session_locks
            .lock()
            .expect("session lock registry mutex should not be poisoned")
            .remove(&session_id);
    }
}
