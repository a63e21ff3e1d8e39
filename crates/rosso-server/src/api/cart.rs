//! Cart handlers and the WhatsApp checkout hand-off.
//!
//! Lines are snapshotted at the viewer's price tier when added. Stock is
//! re-read from the catalog on every add or quantity change.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use rosso_core::{whatsapp_message, whatsapp_url, Cart, CartItem, Product};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::{RequestId, Viewer};

use super::{
    map_airtable_error, map_cart_error, map_checkout_error, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Serialize)]
pub(super) struct CartView {
    id: Uuid,
    items: Vec<CartItem>,
    total: Decimal,
    count: u64,
}

impl CartView {
    fn new(id: Uuid, cart: Cart) -> Self {
        Self {
            id,
            total: cart.total(),
            count: cart.count(),
            items: cart.items().to_vec(),
        }
    }
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub(super) struct AddItemRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct SetQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CheckoutRequest {
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct CheckoutView {
    whatsapp_url: String,
    message: String,
    total: Decimal,
    count: u64,
}

fn cart_not_found(req_id: &str) -> ApiError {
    ApiError::new(req_id, "not_found", "cart not found or expired")
}

/// Fetches a product that can still be sold.
async fn sellable_product(
    state: &AppState,
    req_id: &str,
    product_id: &str,
) -> Result<Product, ApiError> {
    let product = state
        .catalog
        .product(product_id)
        .await
        .map_err(|e| map_airtable_error(req_id, &e))?;
    if product.active {
        Ok(product)
    } else {
        Err(ApiError::new(req_id, "not_found", "product not found"))
    }
}

/// Applies `f` to cart `cart_id` and returns its new state.
async fn mutate_cart(
    state: &AppState,
    req_id: &str,
    cart_id: Uuid,
    f: impl FnOnce(&mut Cart) -> Result<(), rosso_core::CartError>,
) -> Result<CartView, ApiError> {
    let cart = state
        .carts
        .with_cart(cart_id, |cart| f(cart).map(|()| cart.clone()))
        .await
        .ok_or_else(|| cart_not_found(req_id))?
        .map_err(|e| map_cart_error(req_id, &e))?;
    Ok(CartView::new(cart_id, cart))
}

/// POST /api/cart
pub(super) async fn create_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> (StatusCode, Json<ApiResponse<CartView>>) {
    let id = state.carts.create().await;
    tracing::debug!(cart_id = %id, "cart created");
    (
        StatusCode::CREATED,
        ApiResponse::new(CartView::new(id, Cart::new()), req_id),
    )
}

/// GET /api/cart/{cart_id}
pub(super) async fn get_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(cart_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let cart = state
        .carts
        .get(cart_id)
        .await
        .ok_or_else(|| cart_not_found(&req_id.0))?;
    Ok(ApiResponse::new(CartView::new(cart_id, cart), req_id))
}

/// DELETE /api/cart/{cart_id}
pub(super) async fn delete_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(cart_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.carts.remove(cart_id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(cart_not_found(&req_id.0))
    }
}

/// POST /api/cart/{cart_id}/items
pub(super) async fn add_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(viewer): Extension<Viewer>,
    Path(cart_id): Path<Uuid>,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let rid = &req_id.0;
    if state.carts.get(cart_id).await.is_none() {
        return Err(cart_not_found(rid));
    }

    let product = sellable_product(&state, rid, body.product_id.trim()).await?;
    let item = CartItem::from_product(&product, viewer.price_tier(), body.quantity);
    let view = mutate_cart(&state, rid, cart_id, |cart| cart.add(item, product.stock)).await?;

    Ok(ApiResponse::new(view, req_id))
}

/// PATCH /api/cart/{cart_id}/items/{product_id}
pub(super) async fn set_quantity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((cart_id, product_id)): Path<(Uuid, String)>,
    Json(body): Json<SetQuantityRequest>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let rid = &req_id.0;
    let stock = if body.quantity == 0 {
        0
    } else {
        sellable_product(&state, rid, &product_id).await?.stock
    };

    let view = mutate_cart(&state, rid, cart_id, |cart| {
        cart.set_quantity(&product_id, body.quantity, stock)
    })
    .await?;
    Ok(ApiResponse::new(view, req_id))
}

/// DELETE /api/cart/{cart_id}/items/{product_id}
pub(super) async fn remove_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((cart_id, product_id)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let view = mutate_cart(&state, &req_id.0, cart_id, |cart| {
        cart.remove(&product_id).map(|_| ())
    })
    .await?;
    Ok(ApiResponse::new(view, req_id))
}

/// POST /api/cart/{cart_id}/items/{product_id}/decrement
pub(super) async fn decrement_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((cart_id, product_id)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let view = mutate_cart(&state, &req_id.0, cart_id, |cart| {
        cart.decrement(&product_id)
    })
    .await?;
    Ok(ApiResponse::new(view, req_id))
}

/// POST /api/cart/{cart_id}/checkout
///
/// The body is optional; `{ "note": "..." }` is appended to the message.
/// The cart is kept so the customer can retry if the chat never opened.
pub(super) async fn checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(cart_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ApiResponse<CheckoutView>>, ApiError> {
    let rid = &req_id.0;
    let request: CheckoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::new(rid, "bad_request", format!("invalid checkout body: {e}"))
        })?
    };

    let cart = state
        .carts
        .get(cart_id)
        .await
        .ok_or_else(|| cart_not_found(rid))?;

    let message = whatsapp_message(&cart, request.note.as_deref())
        .map_err(|e| map_checkout_error(rid, &e))?;
    let url = whatsapp_url(&state.store.whatsapp_number, &message)
        .map_err(|e| map_checkout_error(rid, &e))?;

    tracing::info!(
        cart_id = %cart_id,
        lines = cart.items().len(),
        count = cart.count(),
        "checkout link generated"
    );

    Ok(ApiResponse::new(
        CheckoutView {
            whatsapp_url: url,
            message,
            total: cart.total(),
            count: cart.count(),
        },
        req_id,
    ))
}
