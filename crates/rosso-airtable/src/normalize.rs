//! Coerces Airtable field values into catalog types.
//!
//! The same logical field can arrive in several shapes depending on how the
//! base is set up: plain text, a lookup array (`["Fundas"]`), an array of
//! objects (`[{"id": "rec…", "name": "Fundas"}]`), or an error placeholder
//! when the lookup source is broken. Everything here is total over
//! `serde_json::Value`: unknown shapes become `None` rather than errors.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rosso_core::{slugify, Brand, CatalogRef, Category, Product, ProductInput, ProductPatch};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::AirtableError;
use crate::types::AirtableRecord;

/// Product table column names, with the Spanish names older bases use.
pub mod fields {
    pub const NAME: &str = "Name";
    pub const SKU: &str = "SKU";
    pub const DESCRIPTION: &str = "Description";
    pub const PRICE_RETAIL: &str = "Price Retail";
    pub const PRICE_WHOLESALE: &str = "Price Wholesale";
    pub const STOCK: &str = "Stock";
    pub const CATEGORY: &str = "Categoria";
    pub const BRAND: &str = "Marca";
    pub const IMAGES: &str = "Images";
    pub const ACTIVE: &str = "Active";
    pub const FEATURED: &str = "Featured";
    pub const CREATED: &str = "Created";

    pub const NAME_ES: &str = "Nombre";
    pub const DESCRIPTION_ES: &str = "Descripcion";
    pub const PRICE_RETAIL_ES: &str = "Precio Minorista";
    pub const PRICE_WHOLESALE_ES: &str = "Precio Mayorista";
    pub const IMAGES_ES: &str = "Imagenes";
    pub const ACTIVE_ES: &str = "Activo";
    pub const FEATURED_ES: &str = "Destacado";
}

const OBJECT_TEXT_KEYS: [&str; 3] = ["name", "value", "text"];

/// Plain text out of any lookup shape.
#[must_use]
pub fn lookup_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.iter().find_map(lookup_to_string),
        Value::Object(map) => {
            if is_error_value(map) {
                return None;
            }
            OBJECT_TEXT_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(lookup_to_string))
        }
    }
}

/// A [`CatalogRef`] for a category or brand field. The id is the linked
/// record id when the value carries one, otherwise the slug of the name.
#[must_use]
pub fn lookup_to_ref(value: &Value) -> Option<CatalogRef> {
    let name = lookup_to_string(value)?;
    let mut reference = CatalogRef::from_name(&name);
    if let Some(id) = linked_record_id(value) {
        reference.id = id;
    }
    Some(reference)
}

/// Image URLs from an attachment field, a list of strings, or a comma or
/// newline separated text field.
#[must_use]
pub fn attachments_to_urls(value: &Value) -> Vec<String> {
    let mut urls = Vec::new();
    collect_urls(value, &mut urls);
    urls
}

fn collect_urls(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(
            s.split([',', '\n'])
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_owned),
        ),
        Value::Array(items) => items.iter().for_each(|item| collect_urls(item, out)),
        Value::Object(map) => {
            let url = map.get("url").and_then(Value::as_str).or_else(|| {
                map.get("thumbnails")
                    .and_then(|t| t.get("large"))
                    .and_then(|l| l.get("url"))
                    .and_then(Value::as_str)
            });
            if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
                out.push(url.to_owned());
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// A decimal out of a number, a formatted string like `"$1,250.50"`, or a
/// single-element lookup array.
#[must_use]
pub fn number_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
                .collect();
            parse_decimal(&cleaned)
        }
        Value::Array(items) if items.len() == 1 => items.first().and_then(number_to_decimal),
        _ => None,
    }
}

/// Like [`number_to_decimal`], truncated toward zero.
#[must_use]
pub fn number_to_i64(value: &Value) -> Option<i64> {
    number_to_decimal(value).and_then(|d| d.trunc().to_i64())
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(_) => number_to_decimal(value).map(|d| !d.is_zero()),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "si" | "sí" | "1" | "checked" => Some(true),
            "false" | "no" | "0" | "" => Some(false),
            _ => None,
        },
        Value::Array(items) if items.len() == 1 => items.first().and_then(to_bool),
        _ => None,
    }
}

fn to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let raw = lookup_to_string(value)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn is_error_value(map: &Map<String, Value>) -> bool {
    map.get("state").and_then(Value::as_str) == Some("error")
        || map.contains_key("specialValue")
        || map.contains_key("error")
}

fn linked_record_id(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(linked_record_id),
        Value::Object(map) => map
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| is_record_id(id))
            .map(str::to_owned),
        _ => None,
    }
}

/// Airtable record ids are `rec` followed by 14 alphanumerics.
#[must_use]
pub fn is_record_id(s: &str) -> bool {
    s.len() == 17 && s.starts_with("rec") && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// First present, non-null field among `names`.
fn field<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| fields.get(*name))
        .find(|v| !v.is_null())
}

fn normalization(record: &AirtableRecord, reason: impl Into<String>) -> AirtableError {
    AirtableError::Normalization {
        record_id: record.id.clone(),
        reason: reason.into(),
    }
}

/// Builds a [`Product`] from a products-table record.
///
/// Missing prices read as zero, except a missing wholesale price, which
/// falls back to the retail price. Missing stock reads as zero, and a
/// missing `Active` flag as active.
///
/// # Errors
///
/// Returns [`AirtableError::Normalization`] if the record has no name or a
/// negative price.
pub fn product_from_record(record: &AirtableRecord) -> Result<Product, AirtableError> {
    use fields as f;
    let fields = &record.fields;

    let name = field(fields, &[f::NAME, f::NAME_ES])
        .and_then(lookup_to_string)
        .ok_or_else(|| normalization(record, "missing product name"))?;

    let price_retail = field(fields, &[f::PRICE_RETAIL, f::PRICE_RETAIL_ES])
        .and_then(number_to_decimal)
        .unwrap_or(Decimal::ZERO);
    let price_wholesale = field(fields, &[f::PRICE_WHOLESALE, f::PRICE_WHOLESALE_ES])
        .and_then(number_to_decimal)
        .unwrap_or(price_retail);
    if price_retail.is_sign_negative() || price_wholesale.is_sign_negative() {
        return Err(normalization(record, "negative price"));
    }

    let created_at = field(fields, &[f::CREATED])
        .and_then(to_datetime)
        .or(record.created_time)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Ok(Product {
        id: record.id.clone(),
        name,
        sku: field(fields, &[f::SKU]).and_then(lookup_to_string),
        description: field(fields, &[f::DESCRIPTION, f::DESCRIPTION_ES])
            .and_then(lookup_to_string),
        price_retail,
        price_wholesale,
        stock: field(fields, &[f::STOCK])
            .and_then(number_to_i64)
            .unwrap_or(0),
        category: field(fields, &[f::CATEGORY]).and_then(lookup_to_ref),
        brand: field(fields, &[f::BRAND]).and_then(lookup_to_ref),
        images: field(fields, &[f::IMAGES, f::IMAGES_ES])
            .map(attachments_to_urls)
            .unwrap_or_default(),
        active: field(fields, &[f::ACTIVE, f::ACTIVE_ES])
            .and_then(to_bool)
            .unwrap_or(true),
        featured: field(fields, &[f::FEATURED, f::FEATURED_ES])
            .and_then(to_bool)
            .unwrap_or(false),
        created_at,
    })
}

/// Builds a [`Category`] from a categories-table record.
///
/// # Errors
///
/// Returns [`AirtableError::Normalization`] if the record has no name.
pub fn category_from_record(record: &AirtableRecord) -> Result<Category, AirtableError> {
    let (name, slug, description) = named_record(record)?;
    Ok(Category {
        id: record.id.clone(),
        name,
        slug,
        description,
    })
}

/// Builds a [`Brand`] from a brands-table record.
///
/// # Errors
///
/// Returns [`AirtableError::Normalization`] if the record has no name.
pub fn brand_from_record(record: &AirtableRecord) -> Result<Brand, AirtableError> {
    let (name, slug, description) = named_record(record)?;
    Ok(Brand {
        id: record.id.clone(),
        name,
        slug,
        description,
    })
}

fn named_record(
    record: &AirtableRecord,
) -> Result<(String, String, Option<String>), AirtableError> {
    use fields as f;
    let name = field(&record.fields, &[f::NAME, f::NAME_ES])
        .and_then(lookup_to_string)
        .ok_or_else(|| normalization(record, "missing name"))?;
    let slug = field(&record.fields, &["Slug"])
        .and_then(lookup_to_string)
        .map_or_else(|| slugify(&name), |s| slugify(&s));
    let description =
        field(&record.fields, &[f::DESCRIPTION, f::DESCRIPTION_ES]).and_then(lookup_to_string);
    Ok((name, slug, description))
}

fn decimal_value(d: Decimal) -> Value {
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

fn text_or_null(s: Option<&str>) -> Value {
    s.map_or(Value::Null, |s| Value::String(s.to_owned()))
}

fn attachments_value(urls: &[String]) -> Value {
    Value::Array(
        urls.iter()
            .map(|url| serde_json::json!({ "url": url }))
            .collect(),
    )
}

/// Write map for creating a product. Category and brand are sent by name.
#[must_use]
pub fn product_fields(input: &ProductInput) -> Map<String, Value> {
    use fields as f;
    let mut map = Map::new();
    map.insert(f::NAME.to_owned(), Value::String(input.name.clone()));
    if let Some(sku) = input.sku.as_deref() {
        map.insert(f::SKU.to_owned(), Value::String(sku.to_owned()));
    }
    if let Some(description) = input.description.as_deref() {
        map.insert(f::DESCRIPTION.to_owned(), Value::String(description.to_owned()));
    }
    map.insert(f::PRICE_RETAIL.to_owned(), decimal_value(input.price_retail));
    map.insert(f::PRICE_WHOLESALE.to_owned(), decimal_value(input.price_wholesale));
    map.insert(f::STOCK.to_owned(), Value::from(input.stock));
    if let Some(category) = input.category.as_deref() {
        map.insert(f::CATEGORY.to_owned(), Value::String(category.to_owned()));
    }
    if let Some(brand) = input.brand.as_deref() {
        map.insert(f::BRAND.to_owned(), Value::String(brand.to_owned()));
    }
    if !input.images.is_empty() {
        map.insert(f::IMAGES.to_owned(), attachments_value(&input.images));
    }
    map.insert(f::ACTIVE.to_owned(), Value::Bool(input.active));
    map.insert(f::FEATURED.to_owned(), Value::Bool(input.featured));
    map
}

/// Write map for a partial update. Cleared optional fields are sent as
/// `null`, which Airtable treats as "empty the cell".
#[must_use]
pub fn product_patch_fields(patch: &ProductPatch) -> Map<String, Value> {
    use fields as f;
    let mut map = Map::new();
    if let Some(name) = patch.name.as_deref() {
        map.insert(f::NAME.to_owned(), Value::String(name.to_owned()));
    }
    if let Some(sku) = patch.sku.as_ref() {
        map.insert(f::SKU.to_owned(), text_or_null(sku.as_deref()));
    }
    if let Some(description) = patch.description.as_ref() {
        map.insert(f::DESCRIPTION.to_owned(), text_or_null(description.as_deref()));
    }
    if let Some(price) = patch.price_retail {
        map.insert(f::PRICE_RETAIL.to_owned(), decimal_value(price));
    }
    if let Some(price) = patch.price_wholesale {
        map.insert(f::PRICE_WHOLESALE.to_owned(), decimal_value(price));
    }
    if let Some(stock) = patch.stock {
        map.insert(f::STOCK.to_owned(), Value::from(stock));
    }
    if let Some(category) = patch.category.as_ref() {
        map.insert(f::CATEGORY.to_owned(), text_or_null(category.as_deref()));
    }
    if let Some(brand) = patch.brand.as_ref() {
        map.insert(f::BRAND.to_owned(), text_or_null(brand.as_deref()));
    }
    if let Some(images) = patch.images.as_deref() {
        map.insert(f::IMAGES.to_owned(), attachments_value(images));
    }
    if let Some(active) = patch.active {
        map.insert(f::ACTIVE.to_owned(), Value::Bool(active));
    }
    if let Some(featured) = patch.featured {
        map.insert(f::FEATURED.to_owned(), Value::Bool(featured));
    }
    map
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
