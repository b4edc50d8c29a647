pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::google::IdentityClaim;

/// Closed set of roles. There is no hierarchy: a requirement names the exact
/// roles it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Admin,
    User,
    Sales,
}

impl Role {
    /// Wire form used in stored documents and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN_ROLE",
            Role::User => "USER_ROLE",
            Role::Sales => "SALES_ROLE",
        }
    }

    /// Case-normalized parse. Accepts both the bare name (`admin`) and the
    /// suffixed wire form (`ADMIN_ROLE`); comparisons after parsing are
    /// exact enum equality.
    pub fn parse(value: &str) -> Option<Role> {
        match value.trim().to_uppercase().as_str() {
            "ADMIN" | "ADMIN_ROLE" => Some(Role::Admin),
            "USER" | "USER_ROLE" => Some(Role::User),
            "SALES" | "SALES_ROLE" => Some(Role::Sales),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| format!("unknown role: {}", s))
    }
}

impl Serialize for Role {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Role::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown role: {}", raw)))
    }
}

/// The authenticated actor associated with a request, as stored in the
/// users collection. `password_hash` never serializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub federated: bool,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
}

/// Collections the gating core reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Categories,
    Products,
    Roles,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Categories => "categories",
            Collection::Products => "products",
            Collection::Roles => "roles",
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            Collection::Users => "user",
            Collection::Categories => "category",
            Collection::Products => "product",
            Collection::Roles => "role",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only persistence collaborator. The gating core never writes through
/// this interface; every resolution is a fresh read so out-of-band
/// deactivation takes effect immediately.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_principal_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError>;

    async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    /// Does a document with this id exist in the collection, and is it active?
    async fn exists_active(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    /// Is `value` unused for `field` among the collection's active documents?
    async fn is_unique_active(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<bool, StoreError>;

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError>;
}

/// The one write seam the federation entry point needs: locate the principal
/// for a verified identity claim, creating a record on first sign-in. The
/// write itself belongs to the business layer behind this trait, which keeps
/// [`DocumentStore`] honestly read-only.
#[async_trait]
pub trait FederatedDirectory: Send + Sync {
    async fn ensure_principal(&self, claim: &IdentityClaim) -> Result<Principal, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_is_case_normalized() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("Admin_Role"), Some(Role::Admin));
        assert_eq!(Role::parse("sales_role"), Some(Role::Sales));
        assert_eq!(Role::parse("SUPERVISOR"), None);
    }

    #[test]
    fn role_round_trips_through_wire_form() {
        for role in [Role::Admin, Role::User, Role::Sales] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn principal_never_serializes_password_hash() {
        let principal = Principal {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role: Role::User,
            active: true,
            federated: false,
            password_hash: Some("$2b$04$secret".into()),
        };
        let json = serde_json::to_value(&principal).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "USER_ROLE");
    }
}
