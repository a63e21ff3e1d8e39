pub mod app_config;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod email;
pub mod password;
pub mod products;
pub mod slug;
pub mod users;

pub use app_config::{AppConfig, Environment};
pub use cart::{Cart, CartError, CartItem};
pub use catalog::{CatalogError, CatalogPage, CatalogQuery, SortOrder, CATALOG_FETCH_LIMIT};
pub use checkout::{whatsapp_message, whatsapp_url, CheckoutError};
pub use config::{load_app_config, load_app_config_from_env};
pub use email::{Email, EmailError};
pub use password::{hash_password, verify_password, PasswordCheck, PasswordError};
pub use products::{
    Brand, CatalogRef, Category, PriceTier, Product, ProductInput, ProductPatch, ValidationError,
};
pub use slug::slugify;
pub use users::{Role, RoleParseError, User};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
