use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rosso_core::{PriceTier, Role};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;
use crate::sessions::SessionStore;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The signed-in user behind the request's bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Present on every request; `None` for anonymous visitors.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<CurrentUser>);

impl Viewer {
    /// Anonymous visitors see retail prices.
    #[must_use]
    pub fn price_tier(&self) -> PriceTier {
        self.0
            .as_ref()
            .map_or(PriceTier::Retail, |user| user.role.price_tier())
    }
}

/// The raw bearer token of a resolved session, kept for logout.
#[derive(Debug, Clone)]
pub struct SessionToken(pub String);

/// Windows kept before stale ones are swept.
const MAX_TRACKED_CLIENTS: usize = 10_000;

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter keyed by client IP.
///
/// Requests whose client cannot be identified share one window.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    windows: Arc<Mutex<HashMap<Option<IpAddr>, RateLimitWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request from `client`; `false` once its window is spent.
    async fn try_acquire(&self, client: Option<IpAddr>) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        if windows.len() >= MAX_TRACKED_CLIENTS {
            windows.retain(|_, w| now.duration_since(w.started_at) < self.window);
        }

        let window = windows.entry(client).or_insert(RateLimitWindow {
            started_at: now,
            count: 0,
        });
        if now.duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

/// Client address from proxy headers (`X-Forwarded-For` first hop, then
/// `X-Real-IP`), falling back to the socket peer.
fn client_ip(req: &Request) -> Option<IpAddr> {
    let headers = req.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Resolves the bearer token, if any, into request extensions.
///
/// Always inserts [`Viewer`]. A live session also inserts [`CurrentUser`]
/// and [`SessionToken`]. Unknown or expired tokens are treated as anonymous
/// here; the route gates decide whether that is acceptable.
pub async fn resolve_session(
    State(sessions): State<SessionStore>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_bearer_token(req.headers().get(AUTHORIZATION)).map(str::to_owned);

    let mut viewer = None;
    if let Some(token) = token {
        if let Some(session) = sessions.resolve(&token).await {
            let user = CurrentUser {
                id: session.user_id,
                email: session.email,
                role: session.role,
            };
            req.extensions_mut().insert(user.clone());
            req.extensions_mut().insert(SessionToken(token));
            viewer = Some(user);
        }
    }
    req.extensions_mut().insert(Viewer(viewer));

    next.run(req).await
}

/// Rejects requests without a live session.
pub async fn require_user(req: Request, next: Next) -> Response {
    if req.extensions().get::<CurrentUser>().is_none() {
        return ApiError::new(
            request_id_of(&req),
            "unauthorized",
            "missing or invalid session token",
        )
        .into_response();
    }
    next.run(req).await
}

/// Rejects requests unless the session belongs to an admin.
pub async fn require_admin(req: Request, next: Next) -> Response {
    let caller = req
        .extensions()
        .get::<CurrentUser>()
        .map(|user| (user.id, user.role));
    match caller {
        Some((_, role)) if role.is_admin() => next.run(req).await,
        Some((user_id, role)) => {
            tracing::warn!(%user_id, %role, "admin route refused");
            ApiError::new(request_id_of(&req), "forbidden", "admin role required").into_response()
        }
        None => ApiError::new(
            request_id_of(&req),
            "unauthorized",
            "missing or invalid session token",
        )
        .into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit per client.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_ip(&req);
    if !rate_limit.try_acquire(client).await {
        tracing::warn!(client = ?client, "rate limit exceeded");
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }
    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
