//! In-memory catalog listing: filtering, sorting and the "load more" page
//! heuristic applied on top of a single capped upstream fetch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::products::{PriceTier, Product};

/// Upper bound on records pulled from the product table per listing.
pub const CATALOG_FETCH_LIMIT: usize = 100;
/// Products shown per "load more" step.
pub const PAGE_SIZE: usize = 20;
pub const DEFAULT_FEATURED_LIMIT: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("min_price {min} is greater than max_price {max}")]
    InvalidPriceRange { min: Decimal, max: Decimal },

    #[error("{field} must not be negative")]
    NegativePrice { field: &'static str },

    #[error("unknown sort order '{0}'")]
    UnknownSort(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl std::str::FromStr for SortOrder {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "price_asc" => Ok(SortOrder::PriceAsc),
            "price_desc" => Ok(SortOrder::PriceDesc),
            "name" => Ok(SortOrder::Name),
            other => Err(CatalogError::UnknownSort(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub sort: Option<SortOrder>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    /// Admin listings see inactive products too; never taken from a query string.
    #[serde(skip)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl<T> CatalogPage<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CatalogPage<U> {
        CatalogPage {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
            has_more: self.has_more,
        }
    }
}

/// The storefront's "load more" rule: a full page suggests another one exists.
#[must_use]
pub fn looks_like_more(count: usize, page_size: usize) -> bool {
    page_size > 0 && count > 0 && count % page_size == 0
}

impl CatalogQuery {
    fn validate(&self) -> Result<(), CatalogError> {
        if let Some(min) = self.min_price {
            if min.is_sign_negative() && !min.is_zero() {
                return Err(CatalogError::NegativePrice { field: "min_price" });
            }
        }
        if let Some(max) = self.max_price {
            if max.is_sign_negative() && !max.is_zero() {
                return Err(CatalogError::NegativePrice { field: "max_price" });
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(CatalogError::InvalidPriceRange { min, max });
            }
        }
        Ok(())
    }

    fn matches(&self, product: &Product, tier: PriceTier) -> bool {
        if !self.include_inactive && !product.active {
            return false;
        }
        if self.in_stock && !product.in_stock() {
            return false;
        }

        let price = product.price_for(tier);
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }

        if let Some(category) = non_blank(self.category.as_deref()) {
            if !product.category.as_ref().is_some_and(|c| c.matches(category)) {
                return false;
            }
        }
        if let Some(brand) = non_blank(self.brand.as_deref()) {
            if !product.brand.as_ref().is_some_and(|b| b.matches(brand)) {
                return false;
            }
        }

        if let Some(needle) = non_blank(self.search.as_deref()) {
            let needle = needle.to_lowercase();
            let hit = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&needle));
            if !(hit(Some(product.name.as_str()))
                || hit(product.sku.as_deref())
                || hit(product.description.as_deref()))
            {
                return false;
            }
        }

        true
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Filters and sorts `products` for `tier`, without paging.
///
/// # Errors
///
/// Returns [`CatalogError`] if the price bounds are negative or inverted.
pub fn filter_products(
    products: Vec<Product>,
    query: &CatalogQuery,
    tier: PriceTier,
) -> Result<Vec<Product>, CatalogError> {
    query.validate()?;

    let mut matched: Vec<Product> = products
        .into_iter()
        .filter(|p| query.matches(p, tier))
        .collect();

    // sort_by is stable: ties keep upstream order.
    match query.sort.unwrap_or_default() {
        SortOrder::Newest => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::PriceAsc => matched.sort_by_key(|p| p.price_for(tier)),
        SortOrder::PriceDesc => {
            matched.sort_by(|a, b| b.price_for(tier).cmp(&a.price_for(tier)));
        }
        SortOrder::Name => matched.sort_by_key(|p| p.name.to_lowercase()),
    }

    Ok(matched)
}

/// Filters, sorts and pages `products` for `tier`.
///
/// # Errors
///
/// Returns [`CatalogError`] if the price bounds are negative or inverted.
pub fn list_products(
    products: Vec<Product>,
    query: &CatalogQuery,
    tier: PriceTier,
) -> Result<CatalogPage<Product>, CatalogError> {
    let matched = filter_products(products, query, tier)?;
    let total = matched.len();
    let offset = query.offset.unwrap_or(0).min(total);
    let limit = query.limit.unwrap_or(PAGE_SIZE).clamp(1, CATALOG_FETCH_LIMIT);

    let items: Vec<Product> = matched.into_iter().skip(offset).take(limit).collect();
    let has_more = looks_like_more(items.len(), limit) && offset + items.len() < total;

    Ok(CatalogPage {
        items,
        total,
        offset,
        limit,
        has_more,
    })
}

/// Featured products: active and flagged, newest first. When nothing is
/// flagged, falls back to the newest active products that are in stock.
#[must_use]
pub fn featured(products: Vec<Product>, limit: usize) -> Vec<Product> {
    let mut active: Vec<Product> = products.into_iter().filter(|p| p.active).collect();
    active.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let flagged: Vec<Product> = active.iter().filter(|p| p.featured).cloned().collect();
    let chosen = if flagged.is_empty() {
        active.into_iter().filter(Product::in_stock).collect()
    } else {
        flagged
    };

    chosen.into_iter().take(limit).collect()
}
