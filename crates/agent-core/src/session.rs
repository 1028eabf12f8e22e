//! Session Management
//!
//! Conversation history keyed by session id. Agents read the history of the
//! turn's session before answering and write the exchange back afterwards,
//! so both routed agents see the same running conversation.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::{Conversation, Message};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Messages a session keeps; older ones are dropped first
pub const MAX_STORED_MESSAGES: usize = 100;

/// A conversation session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// Owner of the session
    pub user_id: String,

    /// History without system prompts
    pub conversation: Conversation,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: user_id.into(),
            conversation: Conversation::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Record one exchange, trimming history to `MAX_STORED_MESSAGES`
    pub fn record(&mut self, user: Message, reply: Message) {
        self.conversation.push(user);
        self.conversation.push(reply);
        self.conversation.keep_last(MAX_STORED_MESSAGES);
        self.touch();
    }

    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }
}

/// Session store trait for persistence
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session) -> Result<()>;

    fn load(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Record one exchange in a single step, starting the session for
    /// `user_id` if absent
    ///
    /// Two turns on the same session must both end up in its history.
    fn append_exchange(
        &self,
        id: &SessionId,
        user_id: &str,
        user: Message,
        reply: Message,
    ) -> Result<()>;
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AgentError {
    AgentError::Session("session store lock poisoned".into())
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<Session>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    fn append_exchange(
        &self,
        id: &SessionId,
        user_id: &str,
        user: Message,
        reply: Message,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions
            .entry(id.clone())
            .or_insert_with(|| Session::new(id.clone(), user_id))
            .record(user, reply);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        let session = Session::new(SessionId::from_string("default_session"), "default_user");
        let id = session.id.clone();

        store.save(&session).unwrap();

        let loaded = store.load(&id).unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.user_id, "default_user");
        assert!(store.load(&SessionId::from_string("other")).unwrap().is_none());
    }

    #[test]
    fn test_append_creates_then_extends() {
        let store = MemorySessionStore::new();
        let id = SessionId::from_string("s1");

        store
            .append_exchange(&id, "u1", Message::user("roll a dice"), Message::assistant("4"))
            .unwrap();
        store
            .append_exchange(&id, "u1", Message::user("again"), Message::assistant("2"))
            .unwrap();

        let session = store.load(&id).unwrap().unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.message_count(), 4);
        assert_eq!(session.conversation.messages()[3].content, "2");
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let store = Arc::new(MemorySessionStore::new());
        let id = SessionId::from_string("default_session");

        std::thread::scope(|scope| {
            for i in 0..16 {
                let store = store.clone();
                let id = id.clone();
                scope.spawn(move || {
                    store
                        .append_exchange(
                            &id,
                            "default_user",
                            Message::user(format!("question {}", i)),
                            Message::assistant(format!("answer {}", i)),
                        )
                        .unwrap();
                });
            }
        });

        assert_eq!(store.load(&id).unwrap().unwrap().message_count(), 32);
    }

    #[test]
    fn test_history_is_capped() {
        let mut session = Session::new(SessionId::new(), "u");
        for i in 0..(MAX_STORED_MESSAGES / 2 + 10) {
            session.record(
                Message::user(format!("q{}", i)),
                Message::assistant(format!("a{}", i)),
            );
        }

        assert_eq!(session.message_count(), MAX_STORED_MESSAGES);
        assert_eq!(session.conversation.messages()[0].content, "q10");
        assert_eq!(session.conversation.last().map(|m| m.content.as_str()), Some("a59"));
    }
}
