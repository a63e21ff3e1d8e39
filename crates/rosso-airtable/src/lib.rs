pub mod catalog;
pub mod client;
pub mod error;
pub mod normalize;
pub(crate) mod retry;
pub mod types;

pub use catalog::{Catalog, CatalogTables};
pub use client::AirtableClient;
pub use error::AirtableError;
pub use types::{AirtableRecord, ListOptions};
