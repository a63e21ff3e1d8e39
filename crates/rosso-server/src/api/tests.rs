use std::{sync::Arc, time::Duration};

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use rosso_airtable::{AirtableClient, Catalog, CatalogTables};
use rosso_core::{hash_password, Role, User};
use rosso_supabase::SupabaseClient;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::carts::CartStore;
use crate::middleware::RateLimitState;
use crate::sessions::SessionStore;

const WHATSAPP: &str = "+54 9 11 1234-5678";

fn test_state(server: &MockServer) -> AppState {
    let airtable = AirtableClient::with_base_url("key123", "appTEST", 5, 0, 0, &server.uri())
        .expect("airtable client");
    let users = SupabaseClient::new(&server.uri(), "service-key", "users", 5).expect("supabase client");
    AppState {
        catalog: Arc::new(Catalog::new(airtable, CatalogTables::default())),
        users: Arc::new(users),
        sessions: SessionStore::new(Duration::from_secs(3600)),
        carts: CartStore::new(Duration::from_secs(3600), 1_000),
        store: Arc::new(StoreSettings {
            whatsapp_number: WHATSAPP.to_owned(),
            low_stock_threshold: 5,
        }),
    }
}

fn app(state: &AppState) -> Router {
    build_app(state.clone(), RateLimitState::new(100, Duration::from_secs(60)))
}

fn user(role: Role) -> User {
    User {
        id: Uuid::new_v4(),
        email: format!("{role}@example.com"),
        password_hash: String::new(),
        role,
        active: true,
        company: None,
        phone: None,
        created_at: Utc::now(),
        updated_at: None,
    }
}

async fn session_for(state: &AppState, role: Role) -> (User, String) {
    let user = user(role);
    let (token, _) = state.sessions.issue(&user).await;
    (user, token)
}

fn user_row(id: Uuid, email: &str, role: &str, hash: &str, active: bool) -> Value {
    json!({
        "id": id,
        "email": email,
        "password_hash": hash,
        "role": role,
        "active": active,
        "company": null,
        "phone": null,
        "created_at": "2025-02-10T15:30:00+00:00",
        "updated_at": null
    })
}

fn product_record(id: &str, name: &str, stock: i64, active: bool) -> Value {
    json!({
        "id": id,
        "createdTime": "2025-01-10T12:00:00.000Z",
        "fields": {
            "Name": name,
            "SKU": format!("SKU-{name}"),
            "Price Retail": 1000,
            "Price Wholesale": 800,
            "Stock": stock,
            "Active": active,
            "Categoria": ["Fundas"]
        }
    })
}

async fn mount_products(server: &MockServer, records: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/appTEST/Products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": records })))
        .mount(server)
        .await;
}

async fn mount_product(server: &MockServer, record: Value) {
    let id = record["id"].as_str().expect("record id").to_owned();
    Mock::given(method("GET"))
        .and(path(format!("/appTEST/Products/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .mount(server)
        .await;
}

async fn mount_user_lookup(server: &MockServer, email: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("email", format!("eq.{email}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, json)
}

fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal string")
        .parse()
        .expect("decimal")
}

// -------------------------------------------------------------------------
// Envelope and health
// -------------------------------------------------------------------------

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("forbidden", StatusCode::FORBIDDEN),
        ("upstream_error", StatusCode::BAD_GATEWAY),
        ("conflict", StatusCode::CONFLICT),
        ("something_else", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, status) in cases {
        let response = ApiError::new("req-1", code, "x").into_response();
        assert_eq!(response.status(), status, "code {code}");
    }
}

#[tokio::test]
async fn health_echoes_request_id() {
    let server = MockServer::start().await;
    let state = test_state(&server);

    let req = Request::builder()
        .uri("/api/health")
        .header("x-request-id", "req-abc")
        .body(Body::empty())
        .expect("request");
    let response = app(&state).oneshot(req).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-abc")
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["meta"]["request_id"], "req-abc");
}

// -------------------------------------------------------------------------
// Public catalog
// -------------------------------------------------------------------------

#[tokio::test]
async fn product_prices_follow_viewer_tier() {
    let server = MockServer::start().await;
    mount_products(
        &server,
        vec![
            product_record("recA", "Funda", 4, true),
            product_record("recOFF", "Oculto", 4, false),
        ],
    )
    .await;
    let state = test_state(&server);
    let app = app(&state);

    let (status, anon) = send(&app, request("GET", "/api/products", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anon["data"]["total"], 1, "inactive products are hidden");
    let item = &anon["data"]["items"][0];
    assert_eq!(decimal(&item["price"]), Decimal::new(1000, 0));
    assert_eq!(item["price_tier"], "retail");
    assert!(item.get("price_wholesale").is_none());

    let (_, token) = session_for(&state, Role::Wholesale).await;
    let (_, wholesale) = send(&app, request("GET", "/api/products", Some(&token), None)).await;
    let item = &wholesale["data"]["items"][0];
    assert_eq!(decimal(&item["price"]), Decimal::new(800, 0));
    assert_eq!(item["price_tier"], "wholesale");
}

#[tokio::test]
async fn unknown_token_browses_as_retail() {
    let server = MockServer::start().await;
    mount_products(&server, vec![product_record("recA", "Funda", 4, true)]).await;
    let state = test_state(&server);

    let (status, json) = send(
        &app(&state),
        request("GET", "/api/products", Some("stale-token"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["items"][0]["price_tier"], "retail");
}

#[tokio::test]
async fn inverted_price_range_is_validation_error() {
    let server = MockServer::start().await;
    mount_products(&server, vec![product_record("recA", "Funda", 4, true)]).await;
    let state = test_state(&server);

    let (status, json) = send(
        &app(&state),
        request("GET", "/api/products?min_price=500&max_price=100", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test]
async fn inactive_product_detail_is_not_found() {
    let server = MockServer::start().await;
    mount_product(&server, product_record("recOFF", "Oculto", 4, false)).await;
    let state = test_state(&server);

    let (status, json) = send(&app(&state), request("GET", "/api/products/recOFF", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn unusable_product_record_is_not_found() {
    let server = MockServer::start().await;
    mount_product(
        &server,
        json!({
            "id": "recNONAME",
            "createdTime": "2025-01-10T12:00:00.000Z",
            "fields": { "Stock": 3, "Active": true }
        }),
    )
    .await;
    let state = test_state(&server);

    let (status, json) =
        send(&app(&state), request("GET", "/api/products/recNONAME", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn path_like_product_id_is_not_found() {
    let server = MockServer::start().await;
    let state = test_state(&server);

    let (status, json) =
        send(&app(&state), request("GET", "/api/products/rec%2E%2E", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
    assert!(server.received_requests().await.expect("recorded").is_empty());
}

#[tokio::test]
async fn catalog_outage_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appTEST/Products"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let state = test_state(&server);

    let (status, json) = send(&app(&state), request("GET", "/api/products", None, None)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["code"], "upstream_error");
}

// -------------------------------------------------------------------------
// Cart and checkout
// -------------------------------------------------------------------------

async fn new_cart(app: &Router) -> String {
    let (status, json) = send(app, request("POST", "/api/cart", None, None)).await;
    assert_eq!(status, StatusCode::CREATED);
    json["data"]["id"].as_str().expect("cart id").to_owned()
}

#[tokio::test]
async fn cart_flow_ends_in_whatsapp_link() {
    let server = MockServer::start().await;
    mount_product(&server, product_record("recA", "Funda", 5, true)).await;
    let state = test_state(&server);
    let app = app(&state);
    let cart_id = new_cart(&app).await;

    let (status, json) = send(
        &app,
        request(
            "POST",
            &format!("/api/cart/{cart_id}/items"),
            None,
            Some(json!({ "product_id": "recA", "quantity": 2 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["count"], 2);
    assert_eq!(decimal(&json["data"]["total"]), Decimal::new(2000, 0));

    let (_, json) = send(
        &app,
        request(
            "POST",
            &format!("/api/cart/{cart_id}/items/recA/decrement"),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(json["data"]["count"], 1);

    let (status, json) = send(
        &app,
        request(
            "POST",
            &format!("/api/cart/{cart_id}/checkout"),
            None,
            Some(json!({ "note": "Retiro en local" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let url = json["data"]["whatsapp_url"].as_str().expect("url");
    assert!(url.starts_with("https://wa.me/5491112345678?text="), "got {url}");
    let message = json["data"]["message"].as_str().expect("message");
    assert!(message.contains("1 x Funda"));
    assert!(message.contains("Nota: Retiro en local"));

    let (status, json) = send(&app, request("GET", &format!("/api/cart/{cart_id}"), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["count"], 1, "checkout keeps the cart");
}

#[tokio::test]
async fn adding_beyond_stock_is_conflict() {
    let server = MockServer::start().await;
    mount_product(&server, product_record("recA", "Funda", 3, true)).await;
    let state = test_state(&server);
    let app = app(&state);
    let cart_id = new_cart(&app).await;

    let (status, json) = send(
        &app,
        request(
            "POST",
            &format!("/api/cart/{cart_id}/items"),
            None,
            Some(json!({ "product_id": "recA", "quantity": 9 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "conflict");

    let (_, json) = send(&app, request("GET", &format!("/api/cart/{cart_id}"), None, None)).await;
    assert_eq!(json["data"]["count"], 0);
}

#[tokio::test]
async fn wholesale_cart_snapshots_wholesale_price() {
    let server = MockServer::start().await;
    mount_product(&server, product_record("recA", "Funda", 5, true)).await;
    let state = test_state(&server);
    let app = app(&state);
    let (_, token) = session_for(&state, Role::Wholesale).await;
    let cart_id = new_cart(&app).await;

    let (_, json) = send(
        &app,
        request(
            "POST",
            &format!("/api/cart/{cart_id}/items"),
            Some(&token),
            Some(json!({ "product_id": "recA" })),
        ),
    )
    .await;
    assert_eq!(decimal(&json["data"]["items"][0]["unit_price"]), Decimal::new(800, 0));
}

#[tokio::test]
async fn empty_cart_checkout_and_unknown_cart() {
    let server = MockServer::start().await;
    let state = test_state(&server);
    let app = app(&state);
    let cart_id = new_cart(&app).await;

    let (status, _) = send(
        &app,
        request("POST", &format!("/api/cart/{cart_id}/checkout"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = Uuid::new_v4();
    let (status, _) = send(&app, request("GET", &format!("/api/cart/{missing}"), None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, request("DELETE", &format!("/api/cart/{cart_id}"), None, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// -------------------------------------------------------------------------
// Auth
// -------------------------------------------------------------------------

#[tokio::test]
async fn login_then_me() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let hash = hash_password("correcto-123").expect("hash");
    mount_user_lookup(
        &server,
        "cliente@rosso.com",
        json!([user_row(id, "cliente@rosso.com", "retail", &hash, true)]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row(
            id,
            "cliente@rosso.com",
            "retail",
            &hash,
            true
        )])))
        .mount(&server)
        .await;
    let state = test_state(&server);
    let app = app(&state);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "cliente@rosso.com", "password": "incorrecto" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, json) = send(
        &app,
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "Cliente@Rosso.com ", "password": "correcto-123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["user"].get("password_hash").is_none());
    let token = json["data"]["token"].as_str().expect("token").to_owned();

    let (status, json) = send(&app, request("GET", "/api/auth/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["email"], "cliente@rosso.com");

    let (status, _) = send(&app, request("POST", "/api/auth/logout", Some(&token), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("GET", "/api/auth/me", Some(&token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn legacy_hash_login_upgrades_to_argon2() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    let salt = "s4lt";
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(b"clave-antigua")
        .finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    let legacy = format!("sha256${salt}${hex}");
    let row = user_row(id, "viejo@rosso.com", "wholesale", &legacy, true);

    mount_user_lookup(&server, "viejo@rosso.com", json!([row.clone()])).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;
    let state = test_state(&server);

    let (status, json) = send(
        &app(&state),
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "viejo@rosso.com", "password": "clave-antigua" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["role"], "wholesale");

    let requests = server.received_requests().await.expect("recorded requests");
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .expect("patch sent");
    let body: Value = serde_json::from_slice(&patch.body).expect("patch body");
    assert!(body["password_hash"]
        .as_str()
        .is_some_and(|h| h.starts_with("$argon2id$")));
}

#[tokio::test]
async fn inactive_account_cannot_log_in() {
    let server = MockServer::start().await;
    let hash = hash_password("correcto-123").expect("hash");
    mount_user_lookup(
        &server,
        "baja@rosso.com",
        json!([user_row(Uuid::new_v4(), "baja@rosso.com", "retail", &hash, false)]),
    )
    .await;
    let state = test_state(&server);

    let (status, json) = send(
        &app(&state),
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "baja@rosso.com", "password": "correcto-123" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "forbidden");
}

#[tokio::test]
async fn bcrypt_hash_requires_reset() {
    let server = MockServer::start().await;
    mount_user_lookup(
        &server,
        "bcrypt@rosso.com",
        json!([user_row(
            Uuid::new_v4(),
            "bcrypt@rosso.com",
            "retail",
            "$2b$10$abcdefghijklmnopqrstuuABCDEFGHIJKLMNOPQRSTUVWXYZ01234",
            true
        )]),
    )
    .await;
    let state = test_state(&server);

    let (status, json) = send(
        &app(&state),
        request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "bcrypt@rosso.com", "password": "cualquiera" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "password reset required");
}

#[tokio::test]
async fn register_rejects_taken_email() {
    let server = MockServer::start().await;
    mount_user_lookup(
        &server,
        "ya@rosso.com",
        json!([user_row(Uuid::new_v4(), "ya@rosso.com", "retail", "x", true)]),
    )
    .await;
    let state = test_state(&server);

    let (status, _) = send(
        &app(&state),
        request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "email": "ya@rosso.com", "password": "nueva-clave-1" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn auth_routes_are_rate_limited() {
    let server = MockServer::start().await;
    let state = test_state(&server);
    let app = build_app(state, RateLimitState::new(1, Duration::from_secs(60)));
    let body = json!({ "email": "not-an-email", "password": "x" });

    let (status, _) = send(&app, request("POST", "/api/auth/login", None, Some(body.clone()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, json) = send(&app, request("POST", "/api/auth/login", None, Some(body))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
}

fn login_from(ip: &str) -> Request<Body> {
    let mut req = request(
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "not-an-email", "password": "x" })),
    );
    req.headers_mut()
        .insert("x-forwarded-for", ip.parse().expect("header value"));
    req
}

#[tokio::test]
async fn one_noisy_client_does_not_lock_out_others() {
    let server = MockServer::start().await;
    let state = test_state(&server);
    let app = build_app(state, RateLimitState::new(2, Duration::from_secs(60)));

    for _ in 0..2 {
        let (status, _) = send(&app, login_from("203.0.113.9")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _) = send(&app, login_from("203.0.113.9")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(&app, login_from("198.51.100.1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cors_preflight_passes_through_trace_layer() {
    let server = MockServer::start().await;
    let state = test_state(&server);

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/products")
        .header("origin", "https://gruporosso.com.ar")
        .header("access-control-request-method", "GET")
        .body(Body::empty())
        .expect("request");
    let response = app(&state).oneshot(req).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

// -------------------------------------------------------------------------
// Admin
// -------------------------------------------------------------------------

#[tokio::test]
async fn admin_routes_require_admin_role() {
    let server = MockServer::start().await;
    mount_products(&server, vec![product_record("recA", "Funda", 2, true)]).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row(
            Uuid::new_v4(),
            "admin@rosso.com",
            "admin",
            "x",
            true
        )])))
        .mount(&server)
        .await;
    let state = test_state(&server);
    let app = app(&state);

    let (status, _) = send(&app, request("GET", "/api/admin/stats", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, retail) = session_for(&state, Role::Retail).await;
    let (status, json) = send(&app, request("GET", "/api/admin/stats", Some(&retail), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["code"], "forbidden");

    let (_, admin) = session_for(&state, Role::Admin).await;
    let (status, json) = send(&app, request("GET", "/api/admin/stats", Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["low_stock"], 1);
    assert_eq!(json["data"]["users_by_role"]["admin"], 1);
}

#[tokio::test]
async fn admin_product_listing_includes_inactive_and_both_prices() {
    let server = MockServer::start().await;
    mount_products(
        &server,
        vec![
            product_record("recA", "Funda", 2, true),
            product_record("recOFF", "Oculto", 2, false),
        ],
    )
    .await;
    let state = test_state(&server);
    let (_, admin) = session_for(&state, Role::Admin).await;

    let (status, json) = send(
        &app(&state),
        request("GET", "/api/admin/products", Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["total"], 2);
    assert!(json["data"]["items"][0].get("price_wholesale").is_some());
}

#[tokio::test]
async fn admin_create_product_validates_before_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/appTEST/Products"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let state = test_state(&server);
    let (_, admin) = session_for(&state, Role::Admin).await;

    let (status, json) = send(
        &app(&state),
        request(
            "POST",
            "/api/admin/products",
            Some(&admin),
            Some(json!({ "name": "Llavero", "price_retail": -1, "price_wholesale": 10 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test]
async fn price_list_uses_requested_tier() {
    let server = MockServer::start().await;
    mount_products(
        &server,
        vec![
            product_record("recA", "Funda", 2, true),
            product_record("recOFF", "Oculto", 2, false),
        ],
    )
    .await;
    let state = test_state(&server);
    let (_, admin) = session_for(&state, Role::Admin).await;
    let app = app(&state);

    let (status, json) = send(
        &app,
        request("GET", "/api/admin/price-list?tier=wholesale", Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["tier"], "wholesale");
    let items = json["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(decimal(&items[0]["price"]), Decimal::new(800, 0));

    let (status, _) = send(
        &app,
        request("GET", "/api/admin/price-list?tier=vip", Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_user_revokes_their_sessions() {
    let server = MockServer::start().await;
    let state = test_state(&server);
    let (_, admin) = session_for(&state, Role::Admin).await;
    let (target, target_token) = session_for(&state, Role::Retail).await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/users"))
        .and(query_param("id", format!("eq.{}", target.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": target.id }])))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(&state);

    let (status, _) = send(
        &app,
        request("DELETE", &format!("/api/users/{}", target.id), Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, request("GET", "/api/auth/me", Some(&target_token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_cannot_demote_themselves() {
    let server = MockServer::start().await;
    let state = test_state(&server);
    let (admin_user, admin) = session_for(&state, Role::Admin).await;

    let (status, json) = send(
        &app(&state),
        request(
            "PATCH",
            &format!("/api/users/{}", admin_user.id),
            Some(&admin),
            Some(json!({ "role": "retail" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "conflict");
}

#[tokio::test]
async fn role_change_revokes_sessions() {
    let server = MockServer::start().await;
    let state = test_state(&server);
    let (_, admin) = session_for(&state, Role::Admin).await;
    let (target, target_token) = session_for(&state, Role::Retail).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([user_row(
            target.id,
            &target.email,
            "wholesale",
            "x",
            true
        )])))
        .expect(1)
        .mount(&server)
        .await;
    let app = app(&state);

    let (status, json) = send(
        &app,
        request(
            "PATCH",
            &format!("/api/users/{}", target.id),
            Some(&admin),
            Some(json!({ "role": "wholesale" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["role"], "wholesale");
    assert!(state.sessions.resolve(&target_token).await.is_none());
}
