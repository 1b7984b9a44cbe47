//! In-memory conversation sessions.
//!
//! Sessions are keyed by (app, user, session id), expire after an idle TTL
//! and are purged lazily. Nothing is persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sprintmind_common::{
    Capability, ContextUpdate, ConversationContext, DecompositionDraft, Result, SprintMindError,
};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub key: SessionKey,
    pub context: ConversationContext,
    /// Capabilities invoked on the previous turn, for follow-ups
    pub last_plan: Vec<Capability>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn new(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            context: ConversationContext::default(),
            last_plan: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// What one turn changed, merged into the session when the turn ends.
#[derive(Debug, Clone, Default)]
pub struct TurnRecord {
    /// Applied in order
    pub updates: Vec<ContextUpdate>,
    /// A draft produced by this turn
    pub draft: Option<DecompositionDraft>,
    pub plan: Vec<Capability>,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, Session>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        now - session.last_activity > self.ttl
    }

    /// Return the live session for `key`, creating it when missing or expired.
    ///
    /// `state`, when given, is applied to the session either way.
    pub async fn create(
        &self,
        key: SessionKey,
        state: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Session {
        let mut sessions = self.sessions.write().await;
        self.purge_locked(&mut sessions, Utc::now());

        let session = sessions.entry(key.clone()).or_insert_with(|| {
            info!(session = %key, "Creating session");
            Session::new(key.clone())
        });

        if let Some(state) = state {
            session.context.apply_state_delta(state);
        }
        session.touch();
        session.clone()
    }

    /// The session, unless it is missing or expired.
    pub async fn get(&self, key: &SessionKey) -> Option<Session> {
        let sessions = self.sessions.read().await;
        sessions
            .get(key)
            .filter(|s| !self.is_expired(s, Utc::now()))
            .cloned()
    }

    /// Fold a finished turn into the live session.
    ///
    /// Only the turn's own changes are merged, so approvals and state deltas
    /// that landed while the agents ran are kept.
    pub async fn update_context(&self, key: &SessionKey, turn: TurnRecord) -> Result<()> {
        self.with_live(key, |session| {
            for update in turn.updates {
                session.context.apply(update);
            }
            if let Some(draft) = turn.draft {
                session.context.pending_draft = Some(draft);
            }
            if !turn.plan.is_empty() {
                session.last_plan = turn.plan;
            }
        })
        .await
    }

    pub async fn apply_state_delta(
        &self,
        key: &SessionKey,
        delta: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        self.with_live(key, |session| session.context.apply_state_delta(delta))
            .await
    }

    /// Remove and return the pending decomposition draft.
    pub async fn take_pending_draft(&self, key: &SessionKey) -> Result<Option<DecompositionDraft>> {
        let mut draft = None;
        self.with_live(key, |session| draft = session.context.pending_draft.take())
            .await?;
        Ok(draft)
    }

    /// Drop expired sessions; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.purge_locked(&mut sessions, Utc::now())
    }

    fn purge_locked(
        &self,
        sessions: &mut HashMap<SessionKey, Session>,
        now: DateTime<Utc>,
    ) -> usize {
        let before = sessions.len();
        sessions.retain(|_, s| !self.is_expired(s, now));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, remaining = sessions.len(), "Purged expired sessions");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn with_live<F>(&self, key: &SessionKey, f: F) -> Result<()>
    where
        F: FnOnce(&mut Session),
    {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        match sessions.get_mut(key) {
            Some(session) if !self.is_expired(session, now) => {
                f(session);
                session.touch();
                Ok(())
            }
            _ => Err(SprintMindError::Session(format!("Session not found: {}", key))),
        }
    }
}
