//! In-memory conversation history, capped per session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::llm::types::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

pub struct SessionManager {
    max_history: usize,
    counter: AtomicU64,
    sessions: Mutex<HashMap<String, Vec<SessionMessage>>>,
}

impl SessionManager {
    /// Keeps the last `max_history` exchanges (`max_history * 2` messages).
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            counter: AtomicU64::new(0),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn create_session(&self) -> Result<String, ApiError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = format!("session_{}", n);
        self.sessions
            .lock()
            .map_err(ApiError::internal)?
            .insert(session_id.clone(), Vec::new());
        tracing::debug!(session_id = %session_id, "Session created");
        Ok(session_id)
    }

    /// Appends a message, creating the session on first use.
    pub fn add_message(&self, session_id: &str, role: Role, content: &str) -> Result<(), ApiError> {
        self.append(session_id, &[(role, content)])
    }

    /// Records a question and its answer as one unit.
    pub fn add_exchange(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<(), ApiError> {
        self.append(
            session_id,
            &[(Role::User, user_message), (Role::Assistant, assistant_message)],
        )
    }

    // one lock for the whole batch, so concurrent exchanges never interleave
    fn append(&self, session_id: &str, entries: &[(Role, &str)]) -> Result<(), ApiError> {
        let mut sessions = self.sessions.lock().map_err(ApiError::internal)?;
        let messages = sessions.entry(session_id.to_string()).or_default();
        let now = Utc::now();
        messages.extend(entries.iter().map(|(role, content)| SessionMessage {
            role: *role,
            content: content.to_string(),
            timestamp: now,
        }));

        let cap = self.max_history * 2;
        if messages.len() > cap {
            let excess = messages.len() - cap;
            messages.drain(..excess);
        }
        Ok(())
    }

    /// `User: ...` / `Assistant: ...` lines, or `None` for unknown or empty sessions.
    pub fn get_conversation_history(&self, session_id: &str) -> Result<Option<String>, ApiError> {
        let sessions = self.sessions.lock().map_err(ApiError::internal)?;
        let Some(messages) = sessions.get(session_id).filter(|m| !m.is_empty()) else {
            return Ok(None);
        };

        let lines: Vec<String> = messages
            .iter()
            .map(|message| {
                let speaker = match message.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                format!("{}: {}", speaker, message.content)
            })
            .collect();
        Ok(Some(lines.join("\n")))
    }

    pub fn messages(&self, session_id: &str) -> Result<Option<Vec<SessionMessage>>, ApiError> {
        let sessions = self.sessions.lock().map_err(ApiError::internal)?;
        Ok(sessions.get(session_id).cloned())
    }

    /// Empties a session's history. Returns whether the session existed.
    pub fn clear_session(&self, session_id: &str) -> Result<bool, ApiError> {
        let mut sessions = self.sessions.lock().map_err(ApiError::internal)?;
        match sessions.get_mut(session_id) {
            Some(messages) => {
                messages.clear();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn session_count(&self) -> Result<usize, ApiError> {
        Ok(self.sessions.lock().map_err(ApiError::internal)?.len())
    }
}
