use tracing::{debug, warn};

use crate::context_window::is_blank_window;
use crate::models::Session;
use crate::summary_cache::{SummaryCache, SummaryError};

/// Prepends the session's focused summary to an incoming prompt.
#[derive(Clone)]
pub struct AugmentationEngine {
    summaries: SummaryCache,
}

impl AugmentationEngine {
    pub fn new(summaries: SummaryCache) -> Self {
        Self { summaries }
    }

    /// Returns the prompt unchanged when the window is empty or its focus
    /// cannot be resolved.
    pub async fn augment(&self, prompt: &str, session: &Session) -> String {
        if is_blank_window(&session.context_window) {
            return prompt.to_string();
        }

        match self.summaries.get_active_summary(session).await {
            Ok(summary) => {
                debug!(session_id = %session.id, summary_id = %summary.id, "prompt augmented");
                augmented_prompt(&summary.summary_text, prompt)
            }
            Err(SummaryError::NotFound(what)) => {
                debug!(session_id = %session.id, missing = %what, "no active summary, prompt unchanged");
                prompt.to_string()
            }
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "augmentation skipped");
                prompt.to_string()
            }
        }
    }
}

pub fn augmented_prompt(summary_text: &str, prompt: &str) -> String {
    format!("Previous context: {summary_text}\n\nUser query: {prompt}")
}
