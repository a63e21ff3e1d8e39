use thiserror::Error;

/// Errors returned by the Airtable client and record normalization.
#[derive(Debug, Error)]
pub enum AirtableError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record not found: {context}")]
    NotFound { context: String },

    /// Airtable rejected the field values (HTTP 422).
    #[error("Airtable rejected the request: {0}")]
    Validation(String),

    #[error("Airtable refused the credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("rate limited by Airtable (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from {context}")]
    UnexpectedStatus { status: u16, context: String },

    #[error("normalization error for record {record_id}: {reason}")]
    Normalization { record_id: String, reason: String },

    #[error("pagination limit reached for table {table}: exceeded {max_pages} pages")]
    PaginationLimit { table: String, max_pages: usize },

    #[error("invalid Airtable base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
