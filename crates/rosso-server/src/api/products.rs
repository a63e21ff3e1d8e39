//! Public catalog handlers. Prices are resolved for the viewer's tier before
//! anything leaves the server; both price columns are never exposed here.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use rosso_airtable::AirtableError;
use rosso_core::{
    catalog::{self, DEFAULT_FEATURED_LIMIT},
    Brand, CatalogPage, CatalogQuery, CatalogRef, Category, PriceTier, Product,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::{RequestId, Viewer};

use super::{map_airtable_error, map_catalog_error, ApiError, ApiResponse, AppState};

const MAX_FEATURED_LIMIT: usize = 24;

#[derive(Debug, Serialize)]
pub(super) struct ProductView {
    id: String,
    name: String,
    sku: Option<String>,
    description: Option<String>,
    price: Decimal,
    price_tier: PriceTier,
    stock: i64,
    in_stock: bool,
    category: Option<CatalogRef>,
    brand: Option<CatalogRef>,
    images: Vec<String>,
    featured: bool,
}

impl ProductView {
    pub(super) fn new(product: Product, tier: PriceTier) -> Self {
        Self {
            price: product.price_for(tier),
            in_stock: product.in_stock(),
            id: product.id,
            name: product.name,
            sku: product.sku,
            description: product.description,
            price_tier: tier,
            stock: product.stock,
            category: product.category,
            brand: product.brand,
            images: product.images,
            featured: product.featured,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct FeaturedQuery {
    pub limit: Option<usize>,
}

/// GET /api/products
pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<ApiResponse<CatalogPage<ProductView>>>, ApiError> {
    let tier = viewer.price_tier();
    let products = state
        .catalog
        .products()
        .await
        .map_err(|e| map_airtable_error(&req_id.0, &e))?;

    let page = catalog::list_products(products, &query, tier)
        .map_err(|e| map_catalog_error(&req_id.0, &e))?;

    Ok(ApiResponse::new(
        page.map(|p| ProductView::new(p, tier)),
        req_id,
    ))
}

/// GET /api/products/featured
pub(super) async fn featured_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<FeaturedQuery>,
) -> Result<Json<ApiResponse<Vec<ProductView>>>, ApiError> {
    let tier = viewer.price_tier();
    let limit = query
        .limit
        .unwrap_or(DEFAULT_FEATURED_LIMIT)
        .clamp(1, MAX_FEATURED_LIMIT);

    let products = state
        .catalog
        .products()
        .await
        .map_err(|e| map_airtable_error(&req_id.0, &e))?;

    let data = catalog::featured(products, limit)
        .into_iter()
        .map(|p| ProductView::new(p, tier))
        .collect();
    Ok(ApiResponse::new(data, req_id))
}

/// GET /api/products/{id}
pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(viewer): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ProductView>>, ApiError> {
    let product = match state.catalog.product(&id).await {
        Ok(product) => product,
        Err(AirtableError::Normalization { record_id, reason }) => {
            tracing::warn!(%record_id, %reason, "product record is not displayable");
            return Err(ApiError::new(&req_id.0, "not_found", "product not found"));
        }
        Err(e) => return Err(map_airtable_error(&req_id.0, &e)),
    };

    if !product.active {
        return Err(ApiError::new(&req_id.0, "not_found", "product not found"));
    }

    Ok(ApiResponse::new(
        ProductView::new(product, viewer.price_tier()),
        req_id,
    ))
}

/// GET /api/categories
pub(super) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Category>>>, ApiError> {
    let categories = state
        .catalog
        .categories()
        .await
        .map_err(|e| map_airtable_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(categories, req_id))
}

/// GET /api/brands
pub(super) async fn list_brands(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Brand>>>, ApiError> {
    let brands = state
        .catalog
        .brands()
        .await
        .map_err(|e| map_airtable_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(brands, req_id))
}
