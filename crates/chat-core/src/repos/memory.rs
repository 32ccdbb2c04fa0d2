use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Message, NewMessage, NewSummary, Session, Summary};

use super::{ChatStore, StoreError, StoreFuture};

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<Uuid, Session>,
    messages: Vec<Message>,
    summaries: Vec<Summary>,
}

impl MemoryState {
    fn has_children(&self, session_id: Uuid) -> bool {
        self.messages.iter().any(|m| m.session_id == session_id)
            || self.summaries.iter().any(|s| s.session_id == session_id)
    }
}

/// Process-local [`ChatStore`] with the same referential rules as the
/// Postgres schema.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }

    pub async fn summary_count(&self) -> usize {
        self.state.read().await.summaries.len()
    }
}

impl ChatStore for InMemoryStore {
    fn insert_session<'a>(&'a self, session: Session) -> StoreFuture<'a, Session> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if state.sessions.contains_key(&session.id) {
                return Err(StoreError::InvalidData(format!(
                    "session {} already exists",
                    session.id
                )));
            }
            state.sessions.insert(session.id, session.clone());
            Ok(session)
        })
    }

    fn get_session<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Option<Session>> {
        Box::pin(async move { Ok(self.state.read().await.sessions.get(&session_id).cloned()) })
    }

    fn list_sessions<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, Vec<Session>> {
        Box::pin(async move {
            let state = self.state.read().await;
            let mut sessions = state
                .sessions
                .values()
                .filter(|session| session.user_id == user_id)
                .cloned()
                .collect::<Vec<_>>();
            sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            Ok(sessions)
        })
    }

    fn update_session_details<'a>(
        &'a self,
        session_id: Uuid,
        legal_topics: String,
        title: String,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let Some(session) = state.sessions.get_mut(&session_id) else {
                return Ok(false);
            };
            session.legal_topics = legal_topics;
            session.title = Some(title);
            session.updated_at = Utc::now();
            Ok(true)
        })
    }

    fn update_context_window<'a>(
        &'a self,
        session_id: Uuid,
        context_window: String,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let Some(session) = state.sessions.get_mut(&session_id) else {
                return Ok(false);
            };
            session.context_window = context_window;
            session.updated_at = Utc::now();
            Ok(true)
        })
    }

    fn set_session_active<'a>(
        &'a self,
        session_id: Uuid,
        active: bool,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let Some(session) = state.sessions.get_mut(&session_id) else {
                return Ok(false);
            };
            session.is_active = active;
            session.updated_at = Utc::now();
            Ok(true)
        })
    }

    fn delete_session<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if state.has_children(session_id) {
                return Err(StoreError::InvalidData(format!(
                    "session {session_id} still has messages or summaries"
                )));
            }
            Ok(state.sessions.remove(&session_id).is_some())
        })
    }

    fn delete_sessions_for_user<'a>(&'a self, user_id: Uuid) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let owned = state
                .sessions
                .values()
                .filter(|session| session.user_id == user_id)
                .map(|session| session.id)
                .collect::<Vec<_>>();
            if let Some(blocked) = owned.iter().find(|id| state.has_children(**id)) {
                return Err(StoreError::InvalidData(format!(
                    "session {blocked} still has messages or summaries"
                )));
            }
            for id in &owned {
                state.sessions.remove(id);
            }
            Ok(owned.len() as u64)
        })
    }

    fn insert_message<'a>(&'a self, message: NewMessage) -> StoreFuture<'a, Message> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if !state.sessions.contains_key(&message.session_id) {
                return Err(StoreError::NotFound(format!(
                    "session {} does not exist",
                    message.session_id
                )));
            }

            let sequence_number = state
                .messages
                .iter()
                .filter(|m| m.session_id == message.session_id)
                .map(|m| m.sequence_number)
                .max()
                .unwrap_or(0)
                + 1;
            let stored = Message {
                id: Uuid::new_v4(),
                session_id: message.session_id,
                prompt: message.prompt,
                response: message.response,
                sequence_number,
                metadata: message.metadata,
                created_at: message.created_at,
            };
            state.messages.push(stored.clone());
            Ok(stored)
        })
    }

    fn list_messages<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Vec<Message>> {
        Box::pin(async move {
            let state = self.state.read().await;
            let mut messages = state
                .messages
                .iter()
                .filter(|m| m.session_id == session_id)
                .cloned()
                .collect::<Vec<_>>();
            messages.sort_by_key(|m| m.sequence_number);
            Ok(messages)
        })
    }

    fn last_message<'a>(&'a self, session_id: Uuid) -> StoreFuture<'a, Option<Message>> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state
                .messages
                .iter()
                .filter(|m| m.session_id == session_id)
                .max_by_key(|m| m.sequence_number)
                .cloned())
        })
    }

    fn update_message_metadata<'a>(
        &'a self,
        message_id: Uuid,
        metadata: Value,
    ) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let Some(message) = state.messages.iter_mut().find(|m| m.id == message_id) else {
                return Ok(false);
            };
            message.metadata = metadata;
            Ok(true)
        })
    }

    fn delete_messages_for_sessions<'a>(
        &'a self,
        session_ids: &'a [Uuid],
    ) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let before = state.messages.len();
            state.messages.retain(|m| !session_ids.contains(&m.session_id));
            Ok((before - state.messages.len()) as u64)
        })
    }

    fn insert_summary<'a>(&'a self, summary: NewSummary) -> StoreFuture<'a, Summary> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if !state.sessions.contains_key(&summary.session_id) {
                return Err(StoreError::NotFound(format!(
                    "session {} does not exist",
                    summary.session_id
                )));
            }

            let stored = Summary {
                id: Uuid::new_v4(),
                session_id: summary.session_id,
                summary_text: summary.summary_text,
                embedding: summary.embedding,
                created_at: summary.created_at,
            };
            state.summaries.push(stored.clone());
            Ok(stored)
        })
    }

    fn get_summary<'a>(&'a self, summary_id: Uuid) -> StoreFuture<'a, Option<Summary>> {
        Box::pin(async move {
            let state = self.state.read().await;
            Ok(state.summaries.iter().find(|s| s.id == summary_id).cloned())
        })
    }

    fn recent_summaries<'a>(
        &'a self,
        session_id: Uuid,
        limit: usize,
    ) -> StoreFuture<'a, Vec<Summary>> {
        Box::pin(async move {
            let state = self.state.read().await;
            // Insertion order breaks ties between equal timestamps.
            let mut summaries = state
                .summaries
                .iter()
                .enumerate()
                .filter(|(_, s)| s.session_id == session_id)
                .collect::<Vec<_>>();
            summaries.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));
            Ok(summaries
                .into_iter()
                .take(limit)
                .map(|(_, s)| s.clone())
                .collect())
        })
    }

    fn delete_summaries_for_sessions<'a>(
        &'a self,
        session_ids: &'a [Uuid],
    ) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            let before = state.summaries.len();
            state.summaries.retain(|s| !session_ids.contains(&s.session_id));
            Ok((before - state.summaries.len()) as u64)
        })
    }
}
