//! Admin catalog handlers: product CRUD against Airtable, dashboard stats
//! and the printable price list.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rosso_core::{
    catalog, CatalogPage, CatalogQuery, PriceTier, Product, ProductInput, ProductPatch, Role,
    User,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    map_airtable_error, map_catalog_error, map_supabase_error, map_validation_error, ApiError,
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(super) struct StatsView {
    total_products: usize,
    active_products: usize,
    out_of_stock: usize,
    low_stock: usize,
    inventory_value: Decimal,
    total_users: usize,
    active_users: usize,
    users_by_role: BTreeMap<Role, usize>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PriceListQuery {
    pub tier: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct PriceListItem {
    id: String,
    sku: Option<String>,
    name: String,
    category: Option<String>,
    brand: Option<String>,
    price: Decimal,
    stock: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct PriceListView {
    tier: PriceTier,
    generated_at: DateTime<Utc>,
    items: Vec<PriceListItem>,
}

/// Dashboard counters over the full catalog and users table.
///
/// Out-of-stock and low-stock only count active products. Low stock means
/// `0 < stock <= low_stock_threshold`. Inventory value is retail price times
/// units on hand over active products.
pub(super) fn compute_stats(
    products: &[Product],
    users: &[User],
    low_stock_threshold: i64,
) -> StatsView {
    let active: Vec<&Product> = products.iter().filter(|p| p.active).collect();

    let mut users_by_role: BTreeMap<Role, usize> = Role::ALL.iter().map(|r| (*r, 0)).collect();
    for user in users {
        *users_by_role.entry(user.role).or_default() += 1;
    }

    StatsView {
        total_products: products.len(),
        active_products: active.len(),
        out_of_stock: active.iter().filter(|p| p.stock <= 0).count(),
        low_stock: active
            .iter()
            .filter(|p| p.stock > 0 && p.stock <= low_stock_threshold)
            .count(),
        inventory_value: active
            .iter()
            .map(|p| p.price_retail * Decimal::from(p.stock.max(0)))
            .sum(),
        total_users: users.len(),
        active_users: users.iter().filter(|u| u.active).count(),
        users_by_role,
    }
}

/// Active products for `tier`, grouped by category then name.
pub(super) fn build_price_list(products: Vec<Product>, tier: PriceTier) -> Vec<PriceListItem> {
    let mut active: Vec<Product> = products.into_iter().filter(|p| p.active).collect();
    active.sort_by_cached_key(|p| {
        (
            p.category
                .as_ref()
                .map_or_else(String::new, |c| c.name.to_lowercase()),
            p.name.to_lowercase(),
        )
    });

    active
        .into_iter()
        .map(|p| PriceListItem {
            price: p.price_for(tier),
            id: p.id,
            sku: p.sku,
            name: p.name,
            category: p.category.map(|c| c.name),
            brand: p.brand.map(|b| b.name),
            stock: p.stock,
        })
        .collect()
}

/// GET /api/admin/products
///
/// Same filters as the public listing, inactive products included, with
/// both price columns.
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(mut query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<CatalogPage<Product>>>, ApiError> {
    query.include_inactive = true;
    let products = state
        .catalog
        .products()
        .await
        .map_err(|e| map_airtable_error(&req_id.0, &e))?;
    let page = catalog::list_products(products, &query, PriceTier::Retail)
        .map_err(|e| map_catalog_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(page, req_id))
}

/// POST /api/admin/products
pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), ApiError> {
    let rid = &req_id.0;
    let input = body.validate().map_err(|e| map_validation_error(rid, &e))?;
    let product = state
        .catalog
        .create_product(&input)
        .await
        .map_err(|e| map_airtable_error(rid, &e))?;

    tracing::info!(product_id = %product.id, by = %current.id, "product created");
    Ok((StatusCode::CREATED, ApiResponse::new(product, req_id)))
}

/// GET /api/admin/products/{id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let product = state
        .catalog
        .product(&id)
        .await
        .map_err(|e| map_airtable_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(product, req_id))
}

/// PATCH /api/admin/products/{id}
pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<ProductPatch>,
) -> Result<Json<ApiResponse<Product>>, ApiError> {
    let rid = &req_id.0;
    if body.is_empty() {
        return Err(ApiError::new(rid, "validation_error", "no fields to update"));
    }
    let patch = body.validate().map_err(|e| map_validation_error(rid, &e))?;
    let product = state
        .catalog
        .update_product(&id, &patch)
        .await
        .map_err(|e| map_airtable_error(rid, &e))?;

    tracing::info!(product_id = %id, by = %current.id, "product updated");
    Ok(ApiResponse::new(product, req_id))
}

/// DELETE /api/admin/products/{id}
pub(super) async fn delete_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .catalog
        .delete_product(&id)
        .await
        .map_err(|e| map_airtable_error(&req_id.0, &e))?;
    tracing::info!(product_id = %id, by = %current.id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/stats
pub(super) async fn stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<StatsView>>, ApiError> {
    let rid = &req_id.0;
    let (products, users) = tokio::join!(state.catalog.products(), state.users.list_users());
    let products = products.map_err(|e| map_airtable_error(rid, &e))?;
    let users = users.map_err(|e| map_supabase_error(rid, &e))?;

    let view = compute_stats(&products, &users, state.store.low_stock_threshold);
    Ok(ApiResponse::new(view, req_id))
}

/// GET /api/admin/price-list?tier=retail|wholesale
pub(super) async fn price_list(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PriceListQuery>,
) -> Result<Json<ApiResponse<PriceListView>>, ApiError> {
    let rid = &req_id.0;
    let tier: PriceTier = query
        .tier
        .as_deref()
        .unwrap_or("retail")
        .parse()
        .map_err(|e| map_validation_error(rid, &e))?;

    let products = state
        .catalog
        .products()
        .await
        .map_err(|e| map_airtable_error(rid, &e))?;

    Ok(ApiResponse::new(
        PriceListView {
            tier,
            generated_at: Utc::now(),
            items: build_price_list(products, tier),
        },
        req_id,
    ))
}
