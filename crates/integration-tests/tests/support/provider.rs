use std::sync::atomic::{AtomicUsize, Ordering};

use chat_core::llm::{
    CompletionProvider, EmbeddingProvider, ProviderFuture, SummaryProvider, TopicProvider,
};
use chat_core::models::ConversationTurn;

/// Deterministic stand-in for every model role.
#[derive(Default)]
pub struct CannedProvider {
    completions: AtomicUsize,
    summaries: AtomicUsize,
}

impl CannedProvider {
    pub fn summary_calls(&self) -> usize {
        self.summaries.load(Ordering::SeqCst)
    }
}

impl CompletionProvider for CannedProvider {
    fn complete<'a>(
        &'a self,
        _system_prompt: &'a str,
        _history: &'a [ConversationTurn],
        _prompt: &'a str,
    ) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let call = self.completions.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!(
                "Answer {call}: see section 94 of the Employment Rights Act 1996 (https://www.legislation.gov.uk/ukpga/1996/18/section/94)."
            ))
        })
    }
}

impl TopicProvider for CannedProvider {
    fn extract_topics<'a>(&'a self, _prompt: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move { Ok("Employment Law".to_string()) })
    }

    fn generate_title<'a>(&'a self, _prompt: &'a str) -> ProviderFuture<'a, String> {
        Box::pin(async move { Ok("Unfair Dismissal".to_string()) })
    }
}

impl SummaryProvider for CannedProvider {
    fn summarize<'a>(&'a self, turns: &'a [ConversationTurn]) -> ProviderFuture<'a, String> {
        Box::pin(async move {
            let call = self.summaries.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("Summary {call} of {} turns", turns.len()))
        })
    }
}

impl EmbeddingProvider for CannedProvider {
    fn embed<'a>(&'a self, _text: &'a str) -> ProviderFuture<'a, Vec<f32>> {
        Box::pin(async move { Ok(vec![0.5, 0.25, 0.125]) })
    }

    fn dimensions(&self) -> usize {
        3
    }
}
