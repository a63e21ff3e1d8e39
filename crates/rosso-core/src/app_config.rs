use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub airtable_api_url: String,
    pub airtable_api_key: String,
    pub airtable_base_id: String,
    pub airtable_products_table: String,
    pub airtable_categories_table: String,
    pub airtable_brands_table: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub supabase_users_table: String,
    /// Destination for checkout hand-off, digits only after normalization.
    pub whatsapp_number: String,
    pub http_timeout_secs: u64,
    pub http_max_retries: u32,
    pub http_retry_backoff_ms: u64,
    pub session_ttl_secs: u64,
    pub cart_ttl_secs: u64,
    /// Upper bound on live carts; the least recently used cart is evicted past it.
    pub max_carts: usize,
    pub low_stock_threshold: i64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("airtable_api_url", &self.airtable_api_url)
            .field("airtable_api_key", &"[redacted]")
            .field("airtable_base_id", &self.airtable_base_id)
            .field("airtable_products_table", &self.airtable_products_table)
            .field("airtable_categories_table", &self.airtable_categories_table)
            .field("airtable_brands_table", &self.airtable_brands_table)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_service_key", &"[redacted]")
            .field("supabase_users_table", &self.supabase_users_table)
            .field("whatsapp_number", &self.whatsapp_number)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_max_retries", &self.http_max_retries)
            .field("http_retry_backoff_ms", &self.http_retry_backoff_ms)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("cart_ttl_secs", &self.cart_ttl_secs)
            .field("max_carts", &self.max_carts)
            .field("low_stock_threshold", &self.low_stock_threshold)
            .finish()
    }
}
