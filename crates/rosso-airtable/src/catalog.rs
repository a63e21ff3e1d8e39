//! Typed catalog access over the three Airtable tables.

use rosso_core::{
    Brand, CatalogRef, Category, Product, ProductInput, ProductPatch, CATALOG_FETCH_LIMIT,
};

use crate::client::AirtableClient;
use crate::error::AirtableError;
use crate::normalize::{
    brand_from_record, category_from_record, is_record_id, product_fields, product_from_record,
    product_patch_fields,
};
use crate::types::{AirtableRecord, ListOptions};

/// Table names for one Airtable base.
#[derive(Debug, Clone)]
pub struct CatalogTables {
    pub products: String,
    pub categories: String,
    pub brands: String,
}

impl Default for CatalogTables {
    fn default() -> Self {
        Self {
            products: "Products".to_owned(),
            categories: "Categories".to_owned(),
            brands: "Brands".to_owned(),
        }
    }
}

pub struct Catalog {
    client: AirtableClient,
    tables: CatalogTables,
}

impl Catalog {
    #[must_use]
    pub fn new(client: AirtableClient, tables: CatalogTables) -> Self {
        Self { client, tables }
    }

    /// Up to [`CATALOG_FETCH_LIMIT`] products, including inactive ones.
    ///
    /// Records that fail normalization are logged and skipped. Category and
    /// brand fields that hold bare linked-record ids are resolved to names.
    ///
    /// # Errors
    ///
    /// Returns any [`AirtableError`] from listing the products table, or from
    /// listing categories/brands when ids need resolving.
    pub async fn products(&self) -> Result<Vec<Product>, AirtableError> {
        let records = self
            .client
            .list_records(&self.tables.products, &ListOptions::limited(CATALOG_FETCH_LIMIT))
            .await?;
        let mut products = normalize_all(&records, product_from_record, "product");
        self.resolve_links(&mut products).await?;
        Ok(products)
    }

    /// # Errors
    ///
    /// - [`AirtableError::NotFound`] if no record has this id.
    /// - [`AirtableError::Normalization`] if the record is not a usable product.
    pub async fn product(&self, id: &str) -> Result<Product, AirtableError> {
        let record = self.client.get_record(&self.tables.products, id).await?;
        self.linked_product(&record).await
    }

    /// # Errors
    ///
    /// Returns any [`AirtableError`] from listing the categories table.
    pub async fn categories(&self) -> Result<Vec<Category>, AirtableError> {
        let records = self
            .client
            .list_records(&self.tables.categories, &ListOptions::default())
            .await?;
        let mut categories = normalize_all(&records, category_from_record, "category");
        categories.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns any [`AirtableError`] from listing the brands table.
    pub async fn brands(&self) -> Result<Vec<Brand>, AirtableError> {
        let records = self
            .client
            .list_records(&self.tables.brands, &ListOptions::default())
            .await?;
        let mut brands = normalize_all(&records, brand_from_record, "brand");
        brands.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(brands)
    }

    /// # Errors
    ///
    /// Returns [`AirtableError::Validation`] if Airtable rejects the fields.
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, AirtableError> {
        let record = self
            .client
            .create_record(&self.tables.products, product_fields(input))
            .await?;
        tracing::info!(id = %record.id, name = %input.name, "created product");
        self.linked_product(&record).await
    }

    /// # Errors
    ///
    /// Returns [`AirtableError::NotFound`] or [`AirtableError::Validation`].
    pub async fn update_product(
        &self,
        id: &str,
        patch: &ProductPatch,
    ) -> Result<Product, AirtableError> {
        let record = self
            .client
            .update_record(&self.tables.products, id, product_patch_fields(patch))
            .await?;
        tracing::info!(id, "updated product");
        self.linked_product(&record).await
    }

    /// # Errors
    ///
    /// Returns [`AirtableError::NotFound`] if no record has this id.
    pub async fn delete_product(&self, id: &str) -> Result<(), AirtableError> {
        self.client.delete_record(&self.tables.products, id).await?;
        tracing::info!(id, "deleted product");
        Ok(())
    }

    async fn linked_product(&self, record: &AirtableRecord) -> Result<Product, AirtableError> {
        let mut products = [product_from_record(record)?];
        self.resolve_links(&mut products).await?;
        let [product] = products;
        Ok(product)
    }

    /// Replaces bare linked-record ids in category and brand fields with the
    /// named records, fetching each table at most once.
    async fn resolve_links(&self, products: &mut [Product]) -> Result<(), AirtableError> {
        if products.iter().any(|p| p.category.as_ref().is_some_and(is_unresolved)) {
            let categories = self.categories().await?;
            for product in products.iter_mut() {
                resolve(&mut product.category, &categories, |c| (&c.id, &c.name, &c.slug));
            }
        }
        if products.iter().any(|p| p.brand.as_ref().is_some_and(is_unresolved)) {
            let brands = self.brands().await?;
            for product in products.iter_mut() {
                resolve(&mut product.brand, &brands, |b| (&b.id, &b.name, &b.slug));
            }
        }
        Ok(())
    }
}

fn normalize_all<T>(
    records: &[AirtableRecord],
    normalize: impl Fn(&AirtableRecord) -> Result<T, AirtableError>,
    kind: &'static str,
) -> Vec<T> {
    records
        .iter()
        .filter_map(|record| match normalize(record) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(record_id = %record.id, kind, error = %e, "skipping Airtable record");
                None
            }
        })
        .collect()
}

/// True when the lookup only gave us a linked record id, not a name.
fn is_unresolved(reference: &CatalogRef) -> bool {
    is_record_id(&reference.name)
}

fn resolve<T>(
    reference: &mut Option<CatalogRef>,
    known: &[T],
    parts: impl Fn(&T) -> (&String, &String, &String),
) {
    let Some(current) = reference.as_ref() else {
        return;
    };
    if !is_unresolved(current) {
        return;
    }
    let found = known.iter().map(&parts).find(|(id, _, _)| **id == current.name);
    *reference = found.map(|(id, name, slug)| CatalogRef {
        id: id.clone(),
        name: name.clone(),
        slug: slug.clone(),
    });
}
