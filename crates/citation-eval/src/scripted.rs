use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chat_core::llm::{
    CompletionProvider, EmbeddingProvider, LlmGatewayError, ProviderFuture, SummaryProvider,
    TopicProvider,
};
use chat_core::models::ConversationTurn;

use crate::case::ScriptedTurn;

const FIXTURE_EMBEDDING_DIMENSIONS: usize = 8;
const AUGMENTED_PREFIX: &str = "Previous context: ";

/// Replays fixture responses in order and records every prompt that reached
/// the completion role.
pub struct FixtureProvider {
    responses: Mutex<VecDeque<String>>,
    seen_prompts: Mutex<Vec<String>>,
    summary_calls: AtomicUsize,
}

impl FixtureProvider {
    pub fn new(turns: &[ScriptedTurn]) -> Self {
        Self {
            responses: Mutex::new(turns.iter().map(|turn| turn.response.clone()).collect()),
            seen_prompts: Mutex::new(Vec::new()),
            summary_calls: AtomicUsize::new(0),
        }
    }

    /// Turn indices whose prompt carried a previous-context preamble.
    pub fn augmented_turns(&self) -> Vec<usize> {
        self.seen_prompts
            .lock()
            .expect("fixture prompt log mutex should not be poisoned")
            .iter()
            .enumerate()
            .filter(|(_, prompt)| prompt.starts_with(AUGMENTED_PREFIX))
            .map(|(index, _)| index)
            .collect()
    }
}

impl CompletionProvider for FixtureProvider {
    fn complete<'a>(
        &'a self,
        _system_prompt: &'a str,
        _history: &'a [ConversationTurn],
        prompt: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            self.seen_prompts
                .lock()
                .expect("fixture prompt log mutex should not be poisoned")
                .push(prompt.to_string());

            self.responses
                .lock()
                .expect("fixture response queue mutex should not be poisoned")
                .pop_front()
                .ok_or_else(|| {
                    LlmGatewayError::ProviderFailure("fixture responses exhausted".to_string())
                })
        })
    }
}

impl TopicProvider for FixtureProvider {
    fn extract_topics<'a>(&'a self, _prompt: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move { Ok("Employment Law, Contract Law".to_string()) })
    }

    fn generate_title<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move { Ok(prompt.chars().take(40).collect::<String>().trim().to_string()) })
    }
}

impl SummaryProvider for FixtureProvider {
    fn summarize<'a>(&'a self, turns: &'a [ConversationTurn]) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let call = self.summary_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let latest = turns
                .last()
                .map(|turn| turn.prompt.as_str())
                .unwrap_or_default();
            Ok(format!(
                "Summary {call} over {} turns, latest question: {latest}",
                turns.len()
            ))
        })
    }
}

impl EmbeddingProvider for FixtureProvider {
    fn embed<'a>(&'a self, _text: &'a str) -> ProviderFuture<'a, Vec<f32>> {
        Box::pin(async move { Ok(vec![0.0; FIXTURE_EMBEDDING_DIMENSIONS]) })
    }

    fn dimensions(&self) -> usize {
        FIXTURE_EMBEDDING_DIMENSIONS
    }
}
