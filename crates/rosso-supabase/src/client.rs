//! HTTP client for the Supabase PostgREST API, scoped to the users table.
//!
//! Requests authenticate with the service-role key, which bypasses row-level
//! security. The key never leaves this process and is never logged.

use std::time::Duration;

use reqwest::{header::HeaderValue, Client, Method, RequestBuilder, StatusCode, Url};
use rosso_core::{Email, User};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::SupabaseError;
use crate::types::{NewUserRow, PostgrestError, UserPatch};

const UNIQUE_VIOLATION: &str = "23505";

pub struct SupabaseClient {
    client: Client,
    service_key: String,
    table_url: Url,
}

impl SupabaseClient {
    /// Creates a client for `{project_url}/rest/v1/{table}`.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`SupabaseError::InvalidBaseUrl`] if `project_url` is not
    /// an absolute http(s) URL.
    pub fn new(
        project_url: &str,
        service_key: &str,
        table: &str,
        timeout_secs: u64,
    ) -> Result<Self, SupabaseError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("rosso/0.1 (accounts)")
            .build()?;

        let invalid = |reason: String| SupabaseError::InvalidBaseUrl {
            url: project_url.to_owned(),
            reason,
        };
        let mut table_url = Url::parse(project_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(table_url.scheme(), "http" | "https") {
            return Err(invalid("expected an absolute http(s) URL".to_owned()));
        }
        table_url
            .path_segments_mut()
            .map_err(|()| invalid("URL cannot be a base".to_owned()))?
            .pop_if_empty()
            .extend(["rest", "v1", table]);

        Ok(Self {
            client,
            service_key: service_key.to_owned(),
            table_url,
        })
    }

    /// All users, newest first.
    ///
    /// # Errors
    ///
    /// Returns any [`SupabaseError`] from the request.
    pub async fn list_users(&self) -> Result<Vec<User>, SupabaseError> {
        let url = self.url(&[("select", "*"), ("order", "created_at.desc")]);
        Self::send(self.request(Method::GET, url)).await
    }

    /// # Errors
    ///
    /// Returns [`SupabaseError::NotFound`] if no row has this id.
    pub async fn get_user(&self, id: Uuid) -> Result<User, SupabaseError> {
        let filter = format!("eq.{id}");
        let url = self.url(&[("select", "*"), ("id", &filter)]);
        let rows: Vec<User> = Self::send(self.request(Method::GET, url)).await?;
        single(rows, || format!("id={id}"))
    }

    /// # Errors
    ///
    /// Returns any [`SupabaseError`] from the request; a missing user is `Ok(None)`.
    pub async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, SupabaseError> {
        let filter = format!("eq.{email}");
        let url = self.url(&[("select", "*"), ("email", &filter), ("limit", "1")]);
        let rows: Vec<User> = Self::send(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next())
    }

    /// # Errors
    ///
    /// Returns [`SupabaseError::Conflict`] if the email is already registered.
    pub async fn create_user(&self, row: &NewUserRow) -> Result<User, SupabaseError> {
        let url = self.url(&[("select", "*")]);
        let request = self.request(Method::POST, url).json(row);
        let rows: Vec<User> = Self::send(returning(request)).await?;
        let user = single(rows, || format!("insert email={}", row.email))?;
        tracing::info!(user_id = %user.id, role = %user.role, "created user");
        Ok(user)
    }

    /// # Errors
    ///
    /// - [`SupabaseError::NotFound`] if no row has this id.
    /// - [`SupabaseError::Conflict`] if an email change collides.
    pub async fn update_user(&self, id: Uuid, patch: &UserPatch) -> Result<User, SupabaseError> {
        let filter = format!("eq.{id}");
        let url = self.url(&[("id", &filter), ("select", "*")]);
        let request = self.request(Method::PATCH, url).json(patch);
        let rows: Vec<User> = Self::send(returning(request)).await?;
        single(rows, || format!("id={id}"))
    }

    /// # Errors
    ///
    /// Returns [`SupabaseError::NotFound`] if no row has this id.
    pub async fn delete_user(&self, id: Uuid) -> Result<(), SupabaseError> {
        let filter = format!("eq.{id}");
        let url = self.url(&[("id", &filter), ("select", "id")]);
        let rows: Vec<serde_json::Value> =
            Self::send(returning(self.request(Method::DELETE, url))).await?;
        if rows.is_empty() {
            return Err(SupabaseError::NotFound {
                context: format!("id={id}"),
            });
        }
        tracing::info!(user_id = %id, "deleted user");
        Ok(())
    }

    pub(crate) fn url(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send<T>(request: RequestBuilder) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let response = request.send().await?;
        let status = response.status();
        let context = response.url().path().to_owned();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        serde_json::from_str(&body).map_err(|source| SupabaseError::Deserialize { context, source })
    }
}

fn returning(request: RequestBuilder) -> RequestBuilder {
    request.header("Prefer", HeaderValue::from_static("return=representation"))
}

fn single<T>(rows: Vec<T>, context: impl FnOnce() -> String) -> Result<T, SupabaseError> {
    rows.into_iter()
        .next()
        .ok_or_else(|| SupabaseError::NotFound { context: context() })
}

/// Maps a non-2xx PostgREST response to a [`SupabaseError`].
pub(crate) fn status_error(status: StatusCode, body: &str) -> SupabaseError {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code.unwrap_or_default();
    let mut message = parsed
        .message
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_owned());
    if let Some(details) = parsed.details.filter(|d| !d.is_empty()) {
        message = format!("{message} ({details})");
    }
    if let Some(hint) = parsed.hint.filter(|h| !h.is_empty()) {
        tracing::debug!(%hint, "PostgREST hint");
    }

    if code == UNIQUE_VIOLATION || status == StatusCode::CONFLICT {
        return SupabaseError::Conflict(message);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SupabaseError::Unauthorized {
            status: status.as_u16(),
        },
        StatusCode::NOT_FOUND => SupabaseError::NotFound { context: message },
        _ => SupabaseError::Api {
            status: status.as_u16(),
            code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> SupabaseClient {
        SupabaseClient::new(url, "svc", "users", 30).expect("client construction should not fail")
    }

    #[test]
    fn url_targets_rest_table() {
        let url = client("https://xyz.supabase.co/").url(&[("select", "*")]);
        assert_eq!(url.as_str(), "https://xyz.supabase.co/rest/v1/users?select=*");
    }

    #[test]
    fn url_encodes_filter_values() {
        let url = client("https://xyz.supabase.co").url(&[("email", "eq.a+b@rosso.com")]);
        assert_eq!(
            url.query(),
            Some("email=eq.a%2Bb%40rosso.com"),
            "plus signs must not turn into spaces"
        );
    }

    #[test]
    fn unique_violation_is_conflict() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"users_email_key\"","details":"Key (email)=(a@b.com) already exists.","hint":null}"#;
        match status_error(StatusCode::BAD_REQUEST, body) {
            SupabaseError::Conflict(msg) => assert!(msg.contains("already exists")),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn other_errors_keep_code_and_status() {
        let body = r#"{"code":"22P02","message":"invalid input syntax for type uuid"}"#;
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, body),
            SupabaseError::Api { status: 400, ref code, .. } if code == "22P02"
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "not json"),
            SupabaseError::Unauthorized { status: 401 }
        ));
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(matches!(
            SupabaseClient::new("ftp://x", "k", "users", 30),
            Err(SupabaseError::InvalidBaseUrl { .. })
        ));
    }
}
