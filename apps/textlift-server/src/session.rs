//! Session Manager
//!
//! Each client works in its own session, and every session owns one job
//! controller. Provides:
//! - In-memory session storage with lock protection
//! - A cap on live sessions
//! - Automatic expiry of idle sessions

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::job::{JobController, SessionView};
use crate::ocr::{LanguageCode, RecognitionEngine};

// ============================================================================
// Constants
// ============================================================================

/// Default maximum number of live sessions
pub const DEFAULT_MAX_SESSIONS: usize = 256;

/// Default idle time before a session expires
pub const DEFAULT_SESSION_EXPIRY_MINUTES: i64 = 60;

// ============================================================================
// Session
// ============================================================================

/// One client's workspace
#[derive(Clone)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    last_seen: Arc<Mutex<DateTime<Utc>>>,
    pub controller: JobController,
}

impl Session {
    fn new(controller: JobController) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_seen: Arc::new(Mutex::new(now)),
            controller,
        }
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        *self.last_seen.lock()
    }

    fn touch(&self) {
        *self.last_seen.lock() = Utc::now();
    }

    /// Idle sessions expire; a session with a running job never does
    pub fn is_expired(&self, idle_for: Duration, now: DateTime<Utc>) -> bool {
        !self.controller.is_running() && self.last_seen() + idle_for < now
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            created_at: self.created_at,
            view: self.controller.view(),
        }
    }
}

/// Session view with its identity, as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub view: SessionView,
}

/// Session error types
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Too many active sessions (max: {0})")]
    TooMany(usize),
}

// ============================================================================
// Session Manager
// ============================================================================

/// Manages client sessions
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    /// Active sessions indexed by ID
    sessions: RwLock<HashMap<Uuid, Session>>,

    /// Engine shared by every session's controller
    engine: Arc<dyn RecognitionEngine>,

    /// Language new sessions start with
    default_language: LanguageCode,

    /// Maximum live sessions (0 = unlimited)
    max_sessions: usize,

    /// Idle time before expiry
    expiry: Duration,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(engine: Arc<dyn RecognitionEngine>) -> Self {
        Self::with_limits(
            engine,
            LanguageCode::default(),
            DEFAULT_MAX_SESSIONS,
            Duration::minutes(DEFAULT_SESSION_EXPIRY_MINUTES),
        )
    }

    /// Create a new session manager with custom limits
    pub fn with_limits(
        engine: Arc<dyn RecognitionEngine>,
        default_language: LanguageCode,
        max_sessions: usize,
        expiry: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SessionManagerInner {
                sessions: RwLock::new(HashMap::new()),
                engine,
                default_language,
                max_sessions,
                expiry,
            }),
        }
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Create a new session
    pub async fn create_session(&self) -> Result<Session, SessionError> {
        let mut sessions = self.inner.sessions.write().await;

        if self.inner.max_sessions > 0 && sessions.len() >= self.inner.max_sessions {
            return Err(SessionError::TooMany(self.inner.max_sessions));
        }

        let controller =
            JobController::with_language(Arc::clone(&self.inner.engine), self.inner.default_language);
        let session = Session::new(controller);
        sessions.insert(session.id, session.clone());

        tracing::info!(session_id = %session.id, "Created session");

        Ok(session)
    }

    /// Get a session by ID and mark it as active
    pub async fn get_session(&self, id: Uuid) -> Result<Session, SessionError> {
        let sessions = self.inner.sessions.read().await;
        let session = sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }

    /// Get a session by string ID
    pub async fn get_session_by_str(&self, id: &str) -> Result<Session, SessionError> {
        let uuid = Uuid::parse_str(id).map_err(|_| SessionError::NotFound(id.to_string()))?;
        self.get_session(uuid).await
    }

    /// Remove a session. A running job is superseded so its result is dropped.
    pub async fn remove_session(&self, id: Uuid) -> Result<Session, SessionError> {
        let session = {
            let mut sessions = self.inner.sessions.write().await;
            sessions
                .remove(&id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?
        };

        session.controller.reset();

        tracing::info!(session_id = %id, "Session removed");

        Ok(session)
    }

    /// Get session count
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Clean up expired sessions
    ///
    /// Returns the number of sessions cleaned up
    pub async fn cleanup_expired(&self) -> usize {
        self.cleanup_idle_since(Utc::now()).await
    }

    async fn cleanup_idle_since(&self, now: DateTime<Utc>) -> usize {
        // Check and remove under one write lock so a session touched or
        // started in between is never dropped
        let expired: Vec<Session> = {
            let mut sessions = self.inner.sessions.write().await;
            let ids: Vec<Uuid> = sessions
                .values()
                .filter(|s| s.is_expired(self.inner.expiry, now))
                .map(|s| s.id)
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &expired {
            session.controller.reset();
            tracing::debug!(session_id = %session.id, "Cleaned up expired session");
        }

        let count = expired.len();
        if count > 0 {
            tracing::info!(count = count, "Cleaned up expired sessions");
        }

        count
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
