use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::citations::{Citation, citations_from_metadata};

pub const DEFAULT_JURISDICTION: &str = "GB";
pub const DEFAULT_DETAIL_LEVEL: &str = "concise";
pub const DEFAULT_CITATION_FORMAT: &str = "OSCOLA";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParameters {
    pub detail_level: String,
    pub jurisdiction: String,
    pub citation_format: String,
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self {
            detail_level: DEFAULT_DETAIL_LEVEL.to_string(),
            jurisdiction: DEFAULT_JURISDICTION.to_string(),
            citation_format: DEFAULT_CITATION_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    New,
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_id: Option<Uuid>,
    pub title: Option<String>,
    pub is_active: bool,
    /// Comma-separated topic tags, empty until the first message.
    pub legal_topics: String,
    /// Serialized context window; `{}` until the first summary.
    pub context_window: String,
    pub analysis_parameters: AnalysisParameters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            document_id: None,
            title: None,
            is_active: true,
            legal_topics: String::new(),
            context_window: "{}".to_string(),
            analysis_parameters: AnalysisParameters::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self, message_count: usize) -> SessionState {
        if !self.is_active {
            SessionState::Closed
        } else if message_count == 0 {
            SessionState::New
        } else {
            SessionState::Active
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub prompt: String,
    pub response: String,
    pub sequence_number: i32,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn citations(&self) -> Vec<Citation> {
        citations_from_metadata(&self.metadata)
    }

    pub fn as_turn(&self) -> ConversationTurn {
        ConversationTurn {
            prompt: self.prompt.clone(),
            response: self.response.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: Uuid,
    pub prompt: String,
    pub response: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: Uuid,
    pub session_id: Uuid,
    pub summary_text: String,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSummary {
    pub session_id: Uuid,
    pub summary_text: String,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

/// One prompt/response pair as handed to the providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub prompt: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub prompt: String,
    pub response: String,
    pub sequence_number: i32,
    pub sources: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            prompt: message.prompt.clone(),
            response: message.response.clone(),
            sequence_number: message.sequence_number,
            sources: message.citations(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: Session,
    pub state: SessionState,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub message_id: Uuid,
    pub sequence_number: i32,
    pub response: String,
    pub sources: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
}
