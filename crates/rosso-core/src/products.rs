use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slug::slugify;

/// Maximum accepted length for product names.
pub const MAX_NAME_LEN: usize = 200;

/// Which of the two price lists a viewer sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Retail,
    Wholesale,
}

impl std::fmt::Display for PriceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceTier::Retail => write!(f, "retail"),
            PriceTier::Wholesale => write!(f, "wholesale"),
        }
    }
}

impl std::str::FromStr for PriceTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retail" | "minorista" => Ok(PriceTier::Retail),
            "wholesale" | "mayorista" => Ok(PriceTier::Wholesale),
            other => Err(ValidationError::new(
                "tier",
                format!("must be 'retail' or 'wholesale', got '{other}'"),
            )),
        }
    }
}

/// A category or brand reference attached to a product.
///
/// Airtable hands these back as lookup fields of assorted shapes; they are
/// coerced into this small object before reaching the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRef {
    pub id: String,
    pub name: String,
    pub slug: String,
}

impl CatalogRef {
    /// Builds a reference from a bare name, using the slug as its id.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_owned();
        let slug = slugify(&name);
        Self {
            id: slug.clone(),
            name,
            slug,
        }
    }

    /// `true` if `needle` names this reference, by slug or by case-insensitive name.
    #[must_use]
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        if needle.is_empty() {
            return false;
        }
        let needle_slug = slugify(needle);
        (!needle_slug.is_empty() && self.slug == needle_slug)
            || self.name.to_lowercase() == needle.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Airtable record id, e.g. `"recA1b2C3d4E5f6G7"`.
    pub id: String,
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price_retail: Decimal,
    pub price_wholesale: Decimal,
    pub stock: i64,
    pub category: Option<CatalogRef>,
    pub brand: Option<CatalogRef>,
    pub images: Vec<String>,
    pub active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn price_for(&self, tier: PriceTier) -> Decimal {
        match tier {
            PriceTier::Retail => self.price_retail,
            PriceTier::Wholesale => self.price_wholesale,
        }
    }

    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Reads a present field (including `null`) as `Some`, so a missing field
/// and an explicit `null` stay distinguishable.
///
/// # Errors
///
/// Propagates the inner deserializer's error.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}

/// Admin payload for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price_retail: Decimal,
    pub price_wholesale: Decimal,
    #[serde(default)]
    pub stock: i64,
    /// Category name as shown in Airtable.
    pub category: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub featured: bool,
}

impl ProductInput {
    /// Trims text fields and checks name, price and stock bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for the first field that fails.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        self.name = validate_name(&self.name)?;
        validate_price("price_retail", self.price_retail)?;
        validate_price("price_wholesale", self.price_wholesale)?;
        validate_stock(self.stock)?;
        self.sku = trim_opt(self.sku);
        self.description = trim_opt(self.description);
        self.category = trim_opt(self.category);
        self.brand = trim_opt(self.brand);
        self.images.retain(|u| !u.trim().is_empty());
        Ok(self)
    }
}

// Option<Option<T>> is intentional: outer None = "not in request" (keep current),
// Some(None) = "explicitly cleared", Some(Some(v)) = "set to value".
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub sku: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub price_retail: Option<Decimal>,
    pub price_wholesale: Option<Decimal>,
    pub stock: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub brand: Option<Option<String>>,
    pub images: Option<Vec<String>>,
    pub active: Option<bool>,
    pub featured: Option<bool>,
}

impl ProductPatch {
    /// # Errors
    ///
    /// Returns [`ValidationError`] for the first present field that fails.
    pub fn validate(mut self) -> Result<Self, ValidationError> {
        if let Some(name) = self.name.as_deref() {
            self.name = Some(validate_name(name)?);
        }
        if let Some(price) = self.price_retail {
            validate_price("price_retail", price)?;
        }
        if let Some(price) = self.price_wholesale {
            validate_price("price_wholesale", price)?;
        }
        if let Some(stock) = self.stock {
            validate_stock(stock)?;
        }
        Ok(self)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.sku.is_none()
            && self.description.is_none()
            && self.price_retail.is_none()
            && self.price_wholesale.is_none()
            && self.stock.is_none()
            && self.category.is_none()
            && self.brand.is_none()
            && self.images.is_none()
            && self.active.is_none()
            && self.featured.is_none()
    }
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            "name",
            format!("must be 1-{MAX_NAME_LEN} characters"),
        ));
    }
    Ok(name.to_owned())
}

fn validate_price(field: &'static str, price: Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new(field, "must not be negative"));
    }
    Ok(())
}

fn validate_stock(stock: i64) -> Result<(), ValidationError> {
    if stock < 0 {
        return Err(ValidationError::new("stock", "must not be negative"));
    }
    Ok(())
}

fn trim_opt(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}
