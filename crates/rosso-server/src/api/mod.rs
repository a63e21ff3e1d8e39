mod admin;
mod auth;
mod cart;
mod products;
mod users;

#[cfg(test)]
mod tests;

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use rosso_airtable::{AirtableError, Catalog};
use rosso_core::{CartError, CatalogError, CheckoutError, ValidationError};
use rosso_supabase::{SupabaseClient, SupabaseError};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::carts::CartStore;
use crate::middleware::{
    enforce_rate_limit, request_id, require_admin, require_user, resolve_session, RateLimitState,
    RequestId,
};
use crate::sessions::SessionStore;

/// Shop settings the handlers read but never change.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub whatsapp_number: String,
    pub low_stock_threshold: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub users: Arc<SupabaseClient>,
    pub sessions: SessionStore,
    pub carts: CartStore,
    pub store: Arc<StoreSettings>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, req_id: RequestId) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(req_id.0),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_airtable_error(request_id: &str, error: &AirtableError) -> ApiError {
    match error {
        AirtableError::NotFound { .. } => ApiError::new(request_id, "not_found", "product not found"),
        AirtableError::Validation(message) => {
            ApiError::new(request_id, "validation_error", message.clone())
        }
        AirtableError::RateLimited { retry_after_secs } => {
            tracing::warn!(retry_after_secs, "catalog rate limited");
            ApiError::new(request_id, "rate_limited", "catalog is busy, try again shortly")
        }
        other => {
            tracing::error!(error = %other, "catalog request failed");
            ApiError::new(request_id, "upstream_error", "catalog unavailable")
        }
    }
}

pub(super) fn map_supabase_error(request_id: &str, error: &SupabaseError) -> ApiError {
    match error {
        SupabaseError::NotFound { .. } => ApiError::new(request_id, "not_found", "user not found"),
        SupabaseError::Conflict(_) => {
            ApiError::new(request_id, "conflict", "a user with that email already exists")
        }
        other => {
            tracing::error!(error = %other, "users request failed");
            ApiError::new(request_id, "upstream_error", "user store unavailable")
        }
    }
}

pub(super) fn map_cart_error(request_id: &str, error: &CartError) -> ApiError {
    let code = match error {
        CartError::ZeroQuantity => "validation_error",
        CartError::NotInCart { .. } => "not_found",
        CartError::InsufficientStock { .. } => "conflict",
    };
    ApiError::new(request_id, code, error.to_string())
}

pub(super) fn map_catalog_error(request_id: &str, error: &CatalogError) -> ApiError {
    ApiError::new(request_id, "validation_error", error.to_string())
}

pub(super) fn map_checkout_error(request_id: &str, error: &CheckoutError) -> ApiError {
    match error {
        CheckoutError::EmptyCart => ApiError::new(request_id, "validation_error", "cart is empty"),
        CheckoutError::InvalidNumber(_) => {
            tracing::error!(error = %error, "checkout number misconfigured");
            ApiError::new(request_id, "internal_error", "checkout unavailable")
        }
    }
}

pub(super) fn map_validation_error(request_id: &str, error: &ValidationError) -> ApiError {
    ApiError::new(request_id, "validation_error", error.to_string())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/products", get(products::list_products))
        .route("/api/products/featured", get(products::featured_products))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/categories", get(products::list_categories))
        .route("/api/brands", get(products::list_brands))
        .route("/api/cart", post(cart::create_cart))
        .route(
            "/api/cart/{cart_id}",
            get(cart::get_cart).delete(cart::delete_cart),
        )
        .route("/api/cart/{cart_id}/items", post(cart::add_item))
        .route(
            "/api/cart/{cart_id}/items/{product_id}",
            patch(cart::set_quantity).delete(cart::remove_item),
        )
        .route(
            "/api/cart/{cart_id}/items/{product_id}/decrement",
            post(cart::decrement_item),
        )
        .route("/api/cart/{cart_id}/checkout", post(cart::checkout))
}

fn auth_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

fn signed_in_router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .layer(axum::middleware::from_fn(require_user))
}

fn admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/api/admin/products/{id}",
            get(admin::get_product)
                .patch(admin::update_product)
                .delete(admin::delete_product),
        )
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/price-list", get(admin::price_list))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .layer(axum::middleware::from_fn(require_admin))
}

pub fn build_app(state: AppState, auth_rate_limit: RateLimitState) -> Router {
    let sessions = state.sessions.clone();

    Router::new()
        .merge(public_router())
        .merge(auth_router(auth_rate_limit))
        .merge(signed_in_router())
        .merge(admin_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(axum::middleware::from_fn_with_state(
                    sessions,
                    resolve_session,
                )),
        )
        .with_state(state)
}

async fn health(Extension(req_id): Extension<RequestId>) -> impl IntoResponse {
    ApiResponse::new(HealthData { status: "ok" }, req_id)
}

/// Limits register and login attempts per client IP.
pub fn default_auth_rate_limit() -> RateLimitState {
    RateLimitState::new(20, Duration::from_secs(60))
}
