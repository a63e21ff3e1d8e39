use thiserror::Error;

/// Errors returned by the Supabase REST client.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no row matched {context}")]
    NotFound { context: String },

    /// Unique constraint violation (Postgres `23505`) or HTTP 409.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("Supabase refused the service key (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Any other PostgREST error body.
    #[error("Supabase error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("invalid Supabase URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
