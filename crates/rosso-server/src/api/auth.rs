//! Registration, login and session handlers.
//!
//! Every login goes through [`verify_password`]. Legacy hashes that still
//! verify are upgraded to Argon2id in place.

use std::sync::LazyLock;

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use rosso_core::{
    hash_password, verify_password, Email, PasswordCheck, PasswordError, Role, User,
};
use rosso_supabase::{NewUserRow, SupabaseError, UserPatch};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId, SessionToken};

use super::{map_supabase_error, ApiError, ApiResponse, AppState};

const INVALID_CREDENTIALS: &str = "invalid email or password";

/// Verified against when no account matches, so a miss costs one Argon2 run
/// like a wrong password does.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("rosso-no-such-account").ok());

fn verify_against_dummy(plain: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(plain, hash);
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub company: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SessionView {
    token: String,
    expires_at: DateTime<Utc>,
    user: User,
}

pub(super) fn map_password_error(req_id: &str, error: &PasswordError) -> ApiError {
    match error {
        PasswordError::TooShort { .. } => {
            ApiError::new(req_id, "validation_error", error.to_string())
        }
        other => {
            tracing::error!(error = %other, "password hashing failed");
            ApiError::new(req_id, "internal_error", "could not process password")
        }
    }
}

pub(super) fn parse_email(req_id: &str, raw: &str) -> Result<Email, ApiError> {
    Email::parse(raw).map_err(|e| ApiError::new(req_id, "validation_error", e.to_string()))
}

pub(super) fn trim_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

async fn start_session(state: &AppState, user: User) -> SessionView {
    let (token, session) = state.sessions.issue(&user).await;
    SessionView {
        token,
        expires_at: session.expires_at,
        user,
    }
}

/// POST /api/auth/register
///
/// Self-registration always creates a retail account.
pub(super) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionView>>), ApiError> {
    let rid = &req_id.0;
    let email = parse_email(rid, &body.email)?;
    let password_hash = hash_password(&body.password).map_err(|e| map_password_error(rid, &e))?;

    let existing = state
        .users
        .find_user_by_email(&email)
        .await
        .map_err(|e| map_supabase_error(rid, &e))?;
    if existing.is_some() {
        return Err(ApiError::new(
            rid,
            "conflict",
            "a user with that email already exists",
        ));
    }

    let row = NewUserRow {
        email: email.into_inner(),
        password_hash,
        role: Role::Retail,
        active: true,
        company: trim_opt(body.company),
        phone: trim_opt(body.phone),
    };
    let user = state
        .users
        .create_user(&row)
        .await
        .map_err(|e| map_supabase_error(rid, &e))?;

    tracing::info!(user_id = %user.id, "user registered");
    let view = start_session(&state, user).await;
    Ok((StatusCode::CREATED, ApiResponse::new(view, req_id)))
}

/// POST /api/auth/login
pub(super) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionView>>, ApiError> {
    let rid = &req_id.0;
    let unauthorized = || ApiError::new(rid, "unauthorized", INVALID_CREDENTIALS);

    let Ok(email) = Email::parse(&body.email) else {
        verify_against_dummy(&body.password);
        return Err(unauthorized());
    };
    let Some(user) = state
        .users
        .find_user_by_email(&email)
        .await
        .map_err(|e| map_supabase_error(rid, &e))?
    else {
        verify_against_dummy(&body.password);
        return Err(unauthorized());
    };

    let check = match verify_password(&body.password, &user.password_hash) {
        Ok(check) => check,
        Err(PasswordError::UnsupportedScheme(scheme)) => {
            tracing::warn!(user_id = %user.id, scheme, "login with retired hash scheme");
            return Err(ApiError::new(rid, "unauthorized", "password reset required"));
        }
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "stored password hash unusable");
            return Err(unauthorized());
        }
    };

    if check == PasswordCheck::Invalid {
        tracing::info!(user_id = %user.id, "failed login");
        return Err(unauthorized());
    }
    if !user.active {
        return Err(ApiError::new(rid, "forbidden", "account is disabled"));
    }

    if check.needs_rehash() {
        upgrade_hash(&state, &user, &body.password).await;
    }

    tracing::info!(user_id = %user.id, role = %user.role, "user logged in");
    let view = start_session(&state, user).await;
    Ok(ApiResponse::new(view, req_id))
}

/// Replaces a legacy hash with Argon2id. Failure only costs the upgrade.
async fn upgrade_hash(state: &AppState, user: &User, plain: &str) {
    let hash = match hash_password(plain) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "could not rehash legacy password");
            return;
        }
    };
    let mut patch = UserPatch::password(hash);
    patch.updated_at = Some(Utc::now());
    match state.users.update_user(user.id, &patch).await {
        Ok(_) => tracing::info!(user_id = %user.id, "upgraded legacy password hash"),
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "failed to store upgraded hash");
        }
    }
}

/// POST /api/auth/logout
pub(super) async fn logout(
    State(state): State<AppState>,
    Extension(token): Extension<SessionToken>,
) -> StatusCode {
    state.sessions.revoke(&token.0).await;
    StatusCode::NO_CONTENT
}

/// GET /api/auth/me
pub(super) async fn me(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let rid = &req_id.0;
    match state.users.get_user(current.id).await {
        Ok(user) if user.active => Ok(ApiResponse::new(user, req_id)),
        Ok(_) | Err(SupabaseError::NotFound { .. }) => {
            state.sessions.revoke_user(current.id).await;
            Err(ApiError::new(rid, "unauthorized", "session is no longer valid"))
        }
        Err(e) => Err(map_supabase_error(rid, &e)),
    }
}
