//! Session value object and scoped session storage

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// An authenticated session against one target database.
///
/// Valid only for the database it was obtained against; superseded by the
/// next login, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    user_id: i64,
    obtained_at: DateTime<Utc>,
    database: String,
}

impl Session {
    pub fn new(token: impl Into<String>, user_id: i64, database: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id,
            obtained_at: Utc::now(),
            database: database.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn obtained_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

/// Who owns re-authentication for a session.
///
/// The distinction is load-bearing: silently re-authenticating under a
/// forwarded identity would cause privilege confusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    /// Token forwarded by an upstream caller; never refreshed here
    Request,
    /// Owned by this process; refreshable on detected expiry
    Process,
}

/// Point-in-time view of the store, used by the refresh single-flight check
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub session: Option<Session>,
    pub stale: bool,
    /// Incremented on every [`SessionStore::set`]
    pub generation: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    session: Option<Session>,
    stale: bool,
    generation: u64,
}

/// Single authoritative holder of the current session for one scope.
///
/// Stores and bookkeeps only; acquiring sessions is the Authenticator's job
/// and writing refreshed sessions back is the Retry Coordinator's.
pub struct SessionStore {
    scope: SessionScope,
    state: Mutex<StoreState>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl SessionStore {
    pub fn new(scope: SessionScope) -> Self {
        Self {
            scope,
            state: Mutex::new(StoreState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Store seeded with an existing session (forwarded token, resumed session)
    pub fn with_session(scope: SessionScope, session: Session) -> Self {
        let store = Self::new(scope);
        store.set(session);
        store
    }

    pub fn scope(&self) -> SessionScope {
        self.scope
    }

    /// Current session, stale or not
    pub fn get(&self) -> Option<Session> {
        self.state
            .lock()
            .expect("session store poisoned")
            .session
            .clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().expect("session store poisoned");
        SessionSnapshot {
            session: state.session.clone(),
            stale: state.stale,
            generation: state.generation,
        }
    }

    /// Supersede the stored session
    pub fn set(&self, session: Session) {
        let mut state = self.state.lock().expect("session store poisoned");
        state.session = Some(session);
        state.stale = false;
        state.generation += 1;
    }

    /// Mark the stored session stale without deleting it
    pub fn invalidate(&self) {
        self.state.lock().expect("session store poisoned").stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.state.lock().expect("session store poisoned").stale
    }

    /// Acquire the refresh single-flight guard.
    ///
    /// Holders must re-check [`SessionStore::snapshot`] after acquisition:
    /// a generation bump since their expiry observation means another task
    /// already refreshed and no login exchange is needed.
    pub(crate) async fn lock_refresh(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }
}
