use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::llm::{
    CompletionProvider, EmbeddingProvider, LlmGatewayError, ProviderFuture, SummaryProvider,
    TopicProvider,
};
use crate::models::{ConversationTurn, Message, NewMessage, NewSummary, Session, Summary};
use crate::repos::{ChatStore, InMemoryStore, StoreFuture};

const TEST_DIMENSIONS: usize = 4;

/// Deterministic provider for every role, counting calls and recording the
/// inputs it was given.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    completion_calls: AtomicUsize,
    topic_calls: AtomicUsize,
    title_calls: AtomicUsize,
    summary_calls: AtomicUsize,
    embedding_calls: AtomicUsize,
    fail_completions: AtomicBool,
    fail_topics: AtomicBool,
    fail_summaries: AtomicBool,
    fail_embeddings: AtomicBool,
    completion_reply: Mutex<Option<String>>,
    completion_delay: Mutex<Option<Duration>>,
    completion_prompts: Mutex<Vec<String>>,
    system_prompts: Mutex<Vec<String>>,
    completion_history_lens: Mutex<Vec<usize>>,
    summarized_turns: Mutex<Vec<ConversationTurn>>,
}

impl ScriptedProvider {
    pub(crate) fn reply_with(&self, reply: &str) {
        *self.completion_reply.lock().expect("lock") = Some(reply.to_string());
    }

    /// Holds every completion open for `delay` before answering.
    pub(crate) fn delay_completions(&self, delay: Duration) {
        *self.completion_delay.lock().expect("lock") = Some(delay);
    }

    pub(crate) fn fail_completions(&self) {
        self.fail_completions.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_topics(&self) {
        self.fail_topics.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_summaries(&self) {
        self.fail_summaries.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_embeddings(&self) {
        self.fail_embeddings.store(true, Ordering::SeqCst);
    }

    pub(crate) fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn topic_calls(&self) -> usize {
        self.topic_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn title_calls(&self) -> usize {
        self.title_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn embedding_calls(&self) -> usize {
        self.embedding_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn completion_prompts(&self) -> Vec<String> {
        self.completion_prompts.lock().expect("lock").clone()
    }

    pub(crate) fn system_prompts(&self) -> Vec<String> {
        self.system_prompts.lock().expect("lock").clone()
    }

    pub(crate) fn completion_history_lens(&self) -> Vec<usize> {
        self.completion_history_lens.lock().expect("lock").clone()
    }

    pub(crate) fn last_summarized_turns(&self) -> Vec<ConversationTurn> {
        self.summarized_turns.lock().expect("lock").clone()
    }
}

fn scripted_failure() -> LlmGatewayError {
    LlmGatewayError::ProviderFailure("scripted failure".to_string())
}

impl CompletionProvider for ScriptedProvider {
    fn complete<'a>(
        &'a self,
        system_prompt: &'a str,
        history: &'a [ConversationTurn],
        prompt: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            self.completion_calls.fetch_add(1, Ordering::SeqCst);
            self.completion_prompts
                .lock()
                .expect("lock")
                .push(prompt.to_string());
            self.system_prompts
                .lock()
                .expect("lock")
                .push(system_prompt.to_string());
            self.completion_history_lens
                .lock()
                .expect("lock")
                .push(history.len());

            let delay = *self.completion_delay.lock().expect("lock");
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_completions.load(Ordering::SeqCst) {
                return Err(scripted_failure());
            }

            let reply = self.completion_reply.lock().expect("lock").clone();
            Ok(reply.unwrap_or_else(|| format!("Answer to: {prompt}")))
        })
    }
}

impl TopicProvider for ScriptedProvider {
    fn extract_topics<'a>(&'a self, _prompt: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            self.topic_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_topics.load(Ordering::SeqCst) {
                return Err(scripted_failure());
            }
            Ok("Employment Law, Contract Law".to_string())
        })
    }

    fn generate_title<'a>(&'a self, _prompt: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            self.title_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_topics.load(Ordering::SeqCst) {
                return Err(scripted_failure());
            }
            Ok("Unfair Dismissal Rights".to_string())
        })
    }
}

impl SummaryProvider for ScriptedProvider {
    fn summarize<'a>(&'a self, turns: &'a [ConversationTurn]) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let call = self.summary_calls.fetch_add(1, Ordering::SeqCst) + 1;
            *self.summarized_turns.lock().expect("lock") = turns.to_vec();
            if self.fail_summaries.load(Ordering::SeqCst) {
                return Err(scripted_failure());
            }
            Ok(format!("Summary {call} covering {} turns.", turns.len()))
        })
    }
}

impl EmbeddingProvider for ScriptedProvider {
    fn embed<'a>(&'a self, _text: &'a str) -> ProviderFuture<'a, Vec<f32>> {
        Box::pin(async move {
            self.embedding_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_embeddings.load(Ordering::SeqCst) {
                return Err(scripted_failure());
            }
            Ok(vec![0.25; TEST_DIMENSIONS])
        })
    }

    fn dimensions(&self) -> usize {
        TEST_DIMENSIONS
    }
}

/// [`InMemoryStore`] whose first context-window write stalls, so a second
/// summarization can start while the first one is still publishing.
pub(crate) struct SlowWindowStore {
    inner: Arc<InMemoryStore>,
    first_write_delay: Duration,
    window_writes: AtomicUsize,
}

impl SlowWindowStore {
    pub(crate) fn new(inner: Arc<InMemoryStore>, first_write_delay: Duration) -> Self {
        Self {
            inner,
            first_write_delay,
            window_writes: AtomicUsize::new(0),
        }
    }

    /// Context-window writes that have finished.
    pub(crate) fn window_writes(&self) -> usize {
        self.window_writes.load(Ordering::SeqCst)
    }
}

impl ChatStore for SlowWindowStore {
    fn insert_session<'a>(&'a self, session: Session) -> StoreFuture<'a, Session> {
        self.inner.insert_session(session)
    }

    fn get_session<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Option<Session>> {
        self.inner.get_session(session_id)
    }

    fn list_sessions<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<Session>> {
        self.inner.list_sessions(user_id)
    }

    fn update_session_details<'a>(
        &'a self,
        session_id: Uuid,
        legal_topics: String,
        title: String,
    ) -> StoreFuture<'a, bool> {
        self.inner
            .update_session_details(session_id, legal_topics, title)
    }

    fn update_context_window<'a>(
        &'a self,
        session_id: Uuid,
        context_window: String,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let stall = self.window_writes.load(Ordering::SeqCst) == 0;
            if stall {
                tokio::time::sleep(self.first_write_delay).await;
            }
            let updated = self
                .inner
                .update_context_window(session_id, context_window)
                .await;
            self.window_writes.fetch_add(1, Ordering::SeqCst);
            updated
        })
    }

    fn set_session_active<'a>(
        &'a self,
        session_id: Uuid,
        active: bool,
    ) -> StoreFuture<'a, bool> {
        self.inner.set_session_active(session_id, active)
    }

    fn delete_session<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, bool> {
        self.inner.delete_session(session_id)
    }

    fn delete_sessions_for_user<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, u64> {
        self.inner.delete_sessions_for_user(user_id)
    }

    fn insert_message<'a>(&'a self, message: NewMessage) -> StoreFuture<'a, Message> {
        self.inner.insert_message(message)
    }

    fn list_messages<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Vec<Message>> {
        self.inner.list_messages(session_id)
    }

    fn last_message<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Option<Message>> {
        self.inner.last_message(session_id)
    }

    fn update_message_metadata<'a>(
        &'a self,
        message_id: Uuid,
        metadata: Value,
    ) -> StoreFuture<'a, bool> {
        self.inner.update_message_metadata(message_id, metadata)
    }

    fn delete_messages_for_sessions<'a>(
        &'a self,
        session_ids: &'a [Uuid],
    ) -> StoreFuture<'a, u64> {
        self.inner.delete_messages_for_sessions(session_ids)
    }

    fn insert_summary<'a>(&'a self, summary: NewSummary) -> StoreFuture<'a, Summary> {
        self.inner.insert_summary(summary)
    }

    fn get_summary<'a>(&'a self, summary_id: Uuid) -> StoreFuture<'a, Option<Summary>> {
        self.inner.get_summary(summary_id)
    }

    fn recent_summaries<'a>(
        &'a self,
        session_id: Uuid,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Summary>> {
        self.inner.recent_summaries(session_id, limit)
    }

    fn delete_summaries_for_sessions<'a>(
        &'a self,
        session_ids: &'a [Uuid],
    ) -> StoreFuture<'a, u64> {
        self.inner.delete_summaries_for_sessions(session_ids)
    }
}
