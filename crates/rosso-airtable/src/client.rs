//! HTTP client for the Airtable REST API.
//!
//! Wraps `reqwest` with bearer authentication, typed status mapping and
//! retry. Table names go into the URL path as single percent-encoded
//! segments, so names with spaces or slashes are safe.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::error::AirtableError;
use crate::retry::retry_with_backoff;
use crate::types::{AirtableRecord, DeletedRecord, ListOptions, ListResponse};

const DEFAULT_BASE_URL: &str = "https://api.airtable.com/v0";

/// Upper bound on pages followed by [`AirtableClient::list_records`].
/// Guards against a cursor that never terminates.
const MAX_PAGES: usize = 100;

/// Airtable asks clients to wait 30 seconds after a 429.
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

/// Client for one Airtable base.
///
/// Use [`AirtableClient::new`] for production or
/// [`AirtableClient::with_base_url`] to point at a mock server in tests.
pub struct AirtableClient {
    client: Client,
    api_key: String,
    base_id: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl AirtableClient {
    /// Creates a client pointed at the production Airtable API.
    ///
    /// # Errors
    ///
    /// Returns [`AirtableError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: &str,
        base_id: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, AirtableError> {
        Self::with_base_url(
            api_key,
            base_id,
            timeout_secs,
            max_retries,
            backoff_base_ms,
            DEFAULT_BASE_URL,
        )
    }

    /// Creates a client with a custom API root (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`AirtableError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`AirtableError::InvalidBaseUrl`] if `base_url` is not an
    /// absolute http(s) URL.
    pub fn with_base_url(
        api_key: &str,
        base_id: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
        base_url: &str,
    ) -> Result<Self, AirtableError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("rosso/0.1 (catalog)")
            .build()?;

        let parsed = Url::parse(base_url).map_err(|e| AirtableError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(AirtableError::InvalidBaseUrl {
                url: base_url.to_owned(),
                reason: "expected an absolute http(s) URL".to_owned(),
            });
        }

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_id: base_id.to_owned(),
            base_url: parsed,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Lists records from `table`, following Airtable's `offset` cursor until
    /// the last page or `options.max_records` is reached.
    ///
    /// # Errors
    ///
    /// - [`AirtableError::PaginationLimit`] if more than 100 pages are returned.
    /// - Any status or transport error from the underlying requests.
    pub async fn list_records(
        &self,
        table: &str,
        options: &ListOptions,
    ) -> Result<Vec<AirtableRecord>, AirtableError> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        for page in 1..=MAX_PAGES {
            let mut url = self.table_url(table, None)?;
            {
                let mut pairs = url.query_pairs_mut();
                if let Some(size) = options.page_size {
                    pairs.append_pair("pageSize", &size.min(100).to_string());
                }
                if let Some(max) = options.max_records {
                    pairs.append_pair("maxRecords", &max.to_string());
                }
                if let Some(formula) = options.filter_by_formula.as_deref() {
                    pairs.append_pair("filterByFormula", formula);
                }
                if let Some(view) = options.view.as_deref() {
                    pairs.append_pair("view", view);
                }
                if let Some(cursor) = offset.as_deref() {
                    pairs.append_pair("offset", cursor);
                }
            }

            let response: ListResponse = self.execute(Method::GET, url, None).await?;
            tracing::debug!(
                table,
                page,
                count = response.records.len(),
                "fetched Airtable page"
            );
            records.extend(response.records);

            if let Some(max) = options.max_records {
                if records.len() >= max {
                    records.truncate(max);
                    return Ok(records);
                }
            }
            match response.offset {
                Some(next) => offset = Some(next),
                None => return Ok(records),
            }
        }

        Err(AirtableError::PaginationLimit {
            table: table.to_owned(),
            max_pages: MAX_PAGES,
        })
    }

    /// # Errors
    ///
    /// Returns [`AirtableError::NotFound`] if the record does not exist.
    pub async fn get_record(&self, table: &str, id: &str) -> Result<AirtableRecord, AirtableError> {
        let url = self.table_url(table, Some(id))?;
        self.execute(Method::GET, url, None).await
    }

    /// Creates a record. Values are sent with `typecast` so text values are
    /// matched against select options and linked records by name.
    ///
    /// # Errors
    ///
    /// Returns [`AirtableError::Validation`] if Airtable rejects the fields.
    pub async fn create_record(
        &self,
        table: &str,
        fields: Map<String, Value>,
    ) -> Result<AirtableRecord, AirtableError> {
        let url = self.table_url(table, None)?;
        let body = json!({ "fields": fields, "typecast": true });
        self.execute(Method::POST, url, Some(body)).await
    }

    /// Updates only the given fields (`PATCH`); omitted fields are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AirtableError::NotFound`] or [`AirtableError::Validation`].
    pub async fn update_record(
        &self,
        table: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<AirtableRecord, AirtableError> {
        let url = self.table_url(table, Some(id))?;
        let body = json!({ "fields": fields, "typecast": true });
        self.execute(Method::PATCH, url, Some(body)).await
    }

    /// # Errors
    ///
    /// Returns [`AirtableError::NotFound`] if the record does not exist, or
    /// [`AirtableError::UnexpectedStatus`] if Airtable reports it was not deleted.
    pub async fn delete_record(&self, table: &str, id: &str) -> Result<(), AirtableError> {
        let url = self.table_url(table, Some(id))?;
        let deleted: DeletedRecord = self.execute(Method::DELETE, url, None).await?;
        if !deleted.deleted {
            return Err(AirtableError::UnexpectedStatus {
                status: 200,
                context: format!("DELETE {table}/{} was not acknowledged", deleted.id),
            });
        }
        Ok(())
    }

    /// `{base_url}/{base_id}/{table}[/{record_id}]`, each segment percent-encoded.
    ///
    /// Record ids must be non-empty and ASCII alphanumeric; anything else
    /// (`..`, slashes, encoded characters) cannot name a record and gives
    /// [`AirtableError::NotFound`] without a request.
    pub(crate) fn table_url(&self, table: &str, record_id: Option<&str>) -> Result<Url, AirtableError> {
        if let Some(id) = record_id {
            if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(AirtableError::NotFound {
                    context: format!("{table}/{id}"),
                });
            }
        }
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| AirtableError::InvalidBaseUrl {
                    url: self.base_url.to_string(),
                    reason: "URL cannot be a base".to_owned(),
                })?;
            segments.pop_if_empty().push(&self.base_id).push(table);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    async fn execute<T>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, AirtableError>
    where
        T: DeserializeOwned,
    {
        let context = format!("{method} {}", url.path());

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let mut request = self
                .client
                .request(method.clone(), url.clone())
                .bearer_auth(&self.api_key);
            if let Some(body) = body.as_ref() {
                request = request.json(body);
            }
            let context = context.clone();
            async move {
                let response = request.send().await?;
                let status = response.status();

                if !status.is_success() {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                    let text = response.text().await.unwrap_or_default();
                    return Err(status_error(status, context, retry_after_secs, &text));
                }

                let text = response.text().await?;
                serde_json::from_str(&text)
                    .map_err(|source| AirtableError::Deserialize { context, source })
            }
        })
        .await
    }
}

/// Maps a non-2xx response to the matching [`AirtableError`] variant.
pub(crate) fn status_error(
    status: StatusCode,
    context: String,
    retry_after_secs: u64,
    body: &str,
) -> AirtableError {
    match status {
        StatusCode::NOT_FOUND => AirtableError::NotFound { context },
        StatusCode::UNPROCESSABLE_ENTITY => {
            AirtableError::Validation(error_message(body).unwrap_or_else(|| status.to_string()))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AirtableError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => AirtableError::RateLimited { retry_after_secs },
        _ => AirtableError::UnexpectedStatus {
            status: status.as_u16(),
            context,
        },
    }
}

/// Extracts the message from `{"error": {"type", "message"}}` or
/// `{"error": "NOT_FOUND"}` bodies.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("error")? {
        Value::String(kind) => Some(kind.clone()),
        Value::Object(detail) => detail
            .get("message")
            .or_else(|| detail.get("type"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
