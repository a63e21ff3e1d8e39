//! Opaque bearer sessions held in process memory.
//!
//! Tokens are 32 random bytes, hex encoded. A session carries the role it
//! was issued with; any change to a user's role, password or active flag
//! revokes that user's sessions so the next request re-authenticates.

use std::{collections::HashMap, fmt::Write as _, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rosso_core::{Role, User};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    ttl: chrono::Duration,
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts a session for `user`, returning the bearer token.
    pub async fn issue(&self, user: &User) -> (String, Session) {
        let now = Utc::now();
        let token = new_token();
        let session = Session {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.clone(), session.clone());
        drop(sessions);

        tracing::debug!(user_id = %user.id, "session issued");
        (token, session)
    }

    /// The live session for `token`. Expired sessions are dropped on lookup.
    pub async fn resolve(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(session) if session.expires_at > Utc::now() => Some(session.clone()),
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.lock().await.remove(token).is_some()
    }

    /// Ends every session belonging to `user_id`, returning how many were open.
    pub async fn revoke_user(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        let revoked = before - sessions.len();
        drop(sessions);

        if revoked > 0 {
            tracing::info!(%user_id, revoked, "revoked sessions");
        }
        revoked
    }
}

fn new_token() -> String {
    let bytes: [u8; 32] = rand::random();
    bytes.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
