use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::products::PriceTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Wholesale,
    Retail,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role '{0}'; expected admin, wholesale or retail")]
pub struct RoleParseError(pub String);

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Wholesale, Role::Retail];

    /// Price list shown on the public catalog for this role.
    #[must_use]
    pub fn price_tier(self) -> PriceTier {
        match self {
            Role::Wholesale => PriceTier::Wholesale,
            Role::Admin | Role::Retail => PriceTier::Retail,
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Wholesale => "wholesale",
            Role::Retail => "retail",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "wholesale" | "mayorista" => Ok(Role::Wholesale),
            "retail" | "minorista" | "cliente" => Ok(Role::Retail),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

/// A row of the users table.
///
/// `password_hash` deserializes from the store but is never serialized back
/// out, and `Debug` redacts it.
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub active: bool,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[redacted]")
            .field("role", &self.role)
            .field("active", &self.active)
            .field("company", &self.company)
            .field("phone", &self.phone)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::nil(),
            email: "taller@example.com".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            role: Role::Wholesale,
            active: true,
            company: Some("Taller Norte".to_string()),
            phone: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn wholesale_sees_wholesale_prices() {
        assert_eq!(Role::Wholesale.price_tier(), PriceTier::Wholesale);
        assert_eq!(Role::Retail.price_tier(), PriceTier::Retail);
        assert_eq!(Role::Admin.price_tier(), PriceTier::Retail);
    }

    #[test]
    fn role_parses_known_names_only() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("mayorista".parse::<Role>().unwrap(), Role::Wholesale);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "wholesale");
    }

    #[test]
    fn password_hash_is_read_from_store_rows() {
        let row = serde_json::json!({
            "id": "00000000-0000-0000-0000-000000000000",
            "email": "a@b.com",
            "password_hash": "$argon2id$x",
            "role": "admin",
            "active": true,
            "company": null,
            "phone": null,
            "created_at": "2025-03-01T12:00:00Z",
            "updated_at": null
        });
        let user: User = serde_json::from_value(row).unwrap();
        assert_eq!(user.password_hash, "$argon2id$x");
        assert!(user.role.is_admin());
    }

    #[test]
    fn debug_redacts_password_hash() {
        let rendered = format!("{:?}", user());
        assert!(!rendered.contains("secret"));
    }
}
