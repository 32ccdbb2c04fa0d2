use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::fallbacks::parse_legal_topics;

pub const EMPTY_CONTEXT_WINDOW: &str = "{}";

/// Pointer structure stored on the session. `current_focus` names the newest
/// summary; `previous_summaries` lists older ones, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_focus: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_summaries: Vec<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legal_topics: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ContextWindowError {
    #[error("context window is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ContextWindow {
    /// Builds the window after `newest` was stored. `recent_newest_first` is
    /// the session's most recent summary ids; `newest` itself is skipped.
    pub fn advance(
        newest: Uuid,
        recent_newest_first: &[Uuid],
        max_previous: usize,
        jurisdiction: &str,
        stored_topics: &str,
    ) -> Self {
        let previous_summaries = recent_newest_first
            .iter()
            .copied()
            .filter(|id| *id != newest)
            .take(max_previous)
            .collect();

        Self {
            current_focus: Some(newest),
            previous_summaries,
            jurisdiction: Some(jurisdiction.to_string()),
            legal_topics: parse_legal_topics(stored_topics),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ContextWindowError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_json::from_str(trimmed)?)
    }

    pub fn parse_or_empty(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|err| {
            warn!(error = %err, "ignoring malformed context window");
            Self::default()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.current_focus.is_none()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| EMPTY_CONTEXT_WINDOW.to_string())
    }
}

/// True when the stored string carries no pointer worth resolving.
pub fn is_blank_window(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == EMPTY_CONTEXT_WINDOW
}
