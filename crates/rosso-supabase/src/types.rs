use chrono::{DateTime, Utc};
use rosso_core::Role;
use serde::{Deserialize, Serialize};

/// Insert payload for the users table. `id` and `created_at` are filled in
/// by column defaults.
#[derive(Debug, Clone, Serialize)]
pub struct NewUserRow {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub company: Option<String>,
    pub phone: Option<String>,
}

/// Partial update for a users row; `None` leaves a column untouched.
// Option<Option<T>>: outer None = "keep", Some(None) = "set to NULL".
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserPatch {
    #[must_use]
    pub fn password(password_hash: String) -> Self {
        Self {
            password_hash: Some(password_hash),
            ..Self::default()
        }
    }
}

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PostgrestError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}
