//! User provisioning commands. These replace the one-off scripts that used
//! to hash passwords and insert rows by hand.

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use rosso_core::{hash_password, Email, Role, User};
use rosso_supabase::{NewUserRow, SupabaseClient, UserPatch};
use serde::Deserialize;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SeedUser {
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SeedFile {
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct SeedReport {
    pub created: usize,
    pub skipped: usize,
}

pub(crate) fn parse_seed_file(raw: &str) -> anyhow::Result<SeedFile> {
    serde_yaml::from_str(raw).context("failed to parse seed file")
}

pub(crate) fn load_seed_file(path: &Path) -> anyhow::Result<SeedFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_seed_file(&raw)
}

/// # Errors
///
/// Fails on an invalid email, a weak password, or any upstream error,
/// including a conflict when the email is taken.
pub(crate) async fn create_user(client: &SupabaseClient, seed: &SeedUser) -> anyhow::Result<User> {
    let email = Email::parse(&seed.email).with_context(|| format!("invalid email '{}'", seed.email))?;
    let password_hash = hash_password(&seed.password)
        .with_context(|| format!("cannot hash password for {email}"))?;
    let row = NewUserRow {
        email: email.into_inner(),
        password_hash,
        role: seed.role,
        active: seed.active,
        company: seed.company.clone(),
        phone: seed.phone.clone(),
    };
    Ok(client.create_user(&row).await?)
}

/// Creates each user whose email is not registered yet.
pub(crate) async fn seed_users(
    client: &SupabaseClient,
    seeds: &[SeedUser],
) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();
    for seed in seeds {
        let email =
            Email::parse(&seed.email).with_context(|| format!("invalid email '{}'", seed.email))?;
        if client.find_user_by_email(&email).await?.is_some() {
            tracing::info!(%email, "user already present, skipping");
            report.skipped += 1;
            continue;
        }
        let user = create_user(client, seed).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "seeded user");
        report.created += 1;
    }
    Ok(report)
}

pub(crate) async fn reset_password(
    client: &SupabaseClient,
    email: &str,
    password: &str,
) -> anyhow::Result<User> {
    let email = Email::parse(email).with_context(|| format!("invalid email '{email}'"))?;
    let user = client
        .find_user_by_email(&email)
        .await?
        .with_context(|| format!("no user with email {email}"))?;

    let mut patch = UserPatch::password(hash_password(password)?);
    patch.updated_at = Some(Utc::now());
    Ok(client.update_user(user.id, &patch).await?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const SEED: &str = r"
users:
  - email: Admin@Rosso.com
    password: admin-clave-1
    role: admin
  - email: taller@example.com
    password: taller-clave-1
    role: wholesale
    company: Taller Sur
    active: false
";

    fn row(email: &str, role: &str) -> serde_json::Value {
        json!([{
            "id": uuid::Uuid::new_v4(),
            "email": email,
            "password_hash": "$argon2id$x",
            "role": role,
            "active": true,
            "company": null,
            "phone": null,
            "created_at": "2025-02-10T15:30:00+00:00",
            "updated_at": null
        }])
    }

    #[test]
    fn seed_file_parses_with_defaults() {
        let file = parse_seed_file(SEED).unwrap();
        assert_eq!(file.users.len(), 2);
        assert!(file.users[0].active);
        assert_eq!(file.users[1].role, Role::Wholesale);
        assert!(!file.users[1].active);
        assert_eq!(file.users[1].company.as_deref(), Some("Taller Sur"));
    }

    #[test]
    fn seed_file_rejects_unknown_role() {
        let raw = "users:\n  - email: a@b.com\n    password: x\n    role: owner\n";
        assert!(parse_seed_file(raw).is_err());
    }

    #[tokio::test]
    async fn seed_creates_only_missing_users() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("email", "eq.admin@rosso.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(row("admin@rosso.com", "admin")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("email", "eq.taller@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/users"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(row("taller@example.com", "wholesale")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "svc", "users", 5).unwrap();
        let file = parse_seed_file(SEED).unwrap();
        let report = seed_users(&client, &file.users).await.unwrap();
        assert_eq!(
            report,
            SeedReport {
                created: 1,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn reset_password_for_unknown_email_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&server.uri(), "svc", "users", 5).unwrap();
        let err = reset_password(&client, "nadie@rosso.com", "nueva-clave-1")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no user"));
    }
}
