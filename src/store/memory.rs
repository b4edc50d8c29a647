//! In-memory [`DocumentStore`] backing the dev server and the test suite.
//! Collections mirror the document store the production deployment talks to.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::google::IdentityClaim;
use super::{Collection, DocumentStore, FederatedDirectory, Principal, Role, StoreError};

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    pub active: bool,
    pub fields: HashMap<String, String>,
}

pub struct MemoryStore {
    principals: RwLock<HashMap<Uuid, Principal>>,
    documents: RwLock<HashMap<Collection, Vec<StoredDocument>>>,
    roles: RwLock<BTreeSet<Role>>,
}

impl MemoryStore {
    /// Starts with the three deployment roles registered, matching the
    /// seeded roles collection.
    pub fn new() -> Self {
        Self {
            principals: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            roles: RwLock::new(BTreeSet::from([Role::Admin, Role::User, Role::Sales])),
        }
    }

    pub async fn insert_principal(&self, principal: Principal) {
        self.principals.write().await.insert(principal.id, principal);
    }

    pub async fn set_principal_active(&self, id: Uuid, active: bool) {
        if let Some(principal) = self.principals.write().await.get_mut(&id) {
            principal.active = active;
        }
    }

    pub async fn insert_document(&self, collection: Collection, id: &str, active: bool) {
        self.insert_document_with(collection, id, active, HashMap::new()).await;
    }

    pub async fn insert_document_with(
        &self,
        collection: Collection,
        id: &str,
        active: bool,
        fields: HashMap<String, String>,
    ) {
        self.documents.write().await.entry(collection).or_default().push(StoredDocument {
            id: id.to_string(),
            active,
            fields,
        });
    }

    pub async fn unregister_role(&self, role: Role) {
        self.roles.write().await.remove(&role);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_principal_by_id(&self, id: Uuid) -> Result<Option<Principal>, StoreError> {
        Ok(self.principals.read().await.get(&id).cloned())
    }

    async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self
            .principals
            .read()
            .await
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn exists_active(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        if collection == Collection::Users {
            let Ok(user_id) = id.parse::<Uuid>() else {
                return Ok(false);
            };
            return Ok(self
                .principals
                .read()
                .await
                .get(&user_id)
                .map(|p| p.active)
                .unwrap_or(false));
        }

        Ok(self
            .documents
            .read()
            .await
            .get(&collection)
            .map(|docs| docs.iter().any(|d| d.active && d.id == id))
            .unwrap_or(false))
    }

    async fn is_unique_active(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        if collection == Collection::Users && field == "email" {
            return Ok(!self
                .principals
                .read()
                .await
                .values()
                .any(|p| p.active && p.email.eq_ignore_ascii_case(value)));
        }

        Ok(!self
            .documents
            .read()
            .await
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .any(|d| d.active && d.fields.get(field).map(String::as_str) == Some(value))
            })
            .unwrap_or(false))
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let Some(role) = Role::parse(name) else {
            return Ok(None);
        };
        Ok(self.roles.read().await.contains(&role).then_some(role))
    }
}

#[async_trait]
impl FederatedDirectory for MemoryStore {
    async fn ensure_principal(&self, claim: &IdentityClaim) -> Result<Principal, StoreError> {
        if let Some(existing) = self.find_principal_by_email(&claim.email).await? {
            return Ok(existing);
        }

        let principal = Principal {
            id: Uuid::new_v4(),
            name: claim.name.clone(),
            email: claim.email.clone(),
            role: Role::User,
            active: true,
            federated: true,
            password_hash: None,
        };
        self.insert_principal(principal.clone()).await;
        Ok(principal)
    }
}
