//! Admin user management. Any change to a user's role, password or active
//! flag ends their open sessions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use rosso_core::{hash_password, products::nullable, Role, User};
use rosso_supabase::{NewUserRow, UserPatch};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::{CurrentUser, RequestId};

use super::auth::{map_password_error, parse_email, trim_opt};
use super::{map_supabase_error, ApiError, ApiResponse, AppState};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default = "default_true")]
    pub active: bool,
    pub company: Option<String>,
    pub phone: Option<String>,
}

// Option<Option<T>> is intentional: outer None = "not in request" (keep current),
// Some(None) = "explicitly cleared", Some(Some(v)) = "set to value".
#[allow(clippy::option_option)]
#[derive(Debug, Default, Deserialize)]
pub(super) struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
}

impl UpdateUserRequest {
    fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.role.is_none()
            && self.active.is_none()
            && self.company.is_none()
            && self.phone.is_none()
    }
}

/// GET /api/users
pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let users = state
        .users
        .list_users()
        .await
        .map_err(|e| map_supabase_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(users, req_id))
}

/// POST /api/users
pub(super) async fn create_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let rid = &req_id.0;
    let email = parse_email(rid, &body.email)?;
    let password_hash = hash_password(&body.password).map_err(|e| map_password_error(rid, &e))?;

    let row = NewUserRow {
        email: email.into_inner(),
        password_hash,
        role: body.role,
        active: body.active,
        company: trim_opt(body.company),
        phone: trim_opt(body.phone),
    };
    let user = state
        .users
        .create_user(&row)
        .await
        .map_err(|e| map_supabase_error(rid, &e))?;
    Ok((StatusCode::CREATED, ApiResponse::new(user, req_id)))
}

/// GET /api/users/{id}
pub(super) async fn get_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state
        .users
        .get_user(id)
        .await
        .map_err(|e| map_supabase_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(user, req_id))
}

/// PATCH /api/users/{id}
pub(super) async fn update_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let rid = &req_id.0;
    if body.is_empty() {
        return Err(ApiError::new(rid, "validation_error", "no fields to update"));
    }
    if id == current.id
        && (body.active == Some(false) || body.role.is_some_and(|r| !r.is_admin()))
    {
        return Err(ApiError::new(
            rid,
            "conflict",
            "admins cannot demote or deactivate themselves",
        ));
    }

    let password_hash = body
        .password
        .as_deref()
        .map(hash_password)
        .transpose()
        .map_err(|e| map_password_error(rid, &e))?;
    let email = body
        .email
        .as_deref()
        .map(|raw| parse_email(rid, raw))
        .transpose()?;

    let revoke = password_hash.is_some() || body.role.is_some() || body.active == Some(false);
    let patch = UserPatch {
        email: email.map(rosso_core::Email::into_inner),
        password_hash,
        role: body.role,
        active: body.active,
        company: body.company.map(trim_opt),
        phone: body.phone.map(trim_opt),
        updated_at: Some(Utc::now()),
    };

    let user = state
        .users
        .update_user(id, &patch)
        .await
        .map_err(|e| map_supabase_error(rid, &e))?;

    if revoke {
        state.sessions.revoke_user(id).await;
    }
    tracing::info!(user_id = %id, by = %current.id, revoke, "user updated");
    Ok(ApiResponse::new(user, req_id))
}

/// DELETE /api/users/{id}
pub(super) async fn delete_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let rid = &req_id.0;
    if id == current.id {
        return Err(ApiError::new(rid, "conflict", "admins cannot delete themselves"));
    }

    state
        .users
        .delete_user(id)
        .await
        .map_err(|e| map_supabase_error(rid, &e))?;
    state.sessions.revoke_user(id).await;

    tracing::info!(user_id = %id, by = %current.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
