//! Concrete field checks. Referential checks are parameterized over the
//! store interface; there is one `exists_and_active` and one
//! `unique_across_active`, not a copy per collection.

use async_trait::async_trait;
use serde_json::Value;

use crate::store::Collection;
use super::{Check, CheckContext, FieldRef, ValidationFailure};

fn as_nonempty_str<'a>(value: Option<&'a Value>) -> Option<&'a str> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// Present, non-null, and (for strings) non-blank.
pub struct Required {
    field: FieldRef,
}

pub fn required(field: FieldRef) -> Required {
    Required { field }
}

#[async_trait]
impl Check for Required {
    fn field(&self) -> &FieldRef {
        &self.field
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), ValidationFailure> {
        match ctx.value_of(&self.field) {
            None | Some(Value::Null) => {
                Err(ValidationFailure::new(&self.field, "is required"))
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                Err(ValidationFailure::new(&self.field, "is required"))
            }
            Some(_) => Ok(()),
        }
    }
}

pub struct IsEmail {
    field: FieldRef,
}

pub fn is_email(field: FieldRef) -> IsEmail {
    IsEmail { field }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[async_trait]
impl Check for IsEmail {
    fn field(&self) -> &FieldRef {
        &self.field
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), ValidationFailure> {
        match as_nonempty_str(ctx.value_of(&self.field)) {
            Some(s) if looks_like_email(s) => Ok(()),
            _ => Err(ValidationFailure::new(&self.field, "must be a valid email")),
        }
    }
}

pub struct MinLength {
    field: FieldRef,
    min: usize,
}

pub fn min_length(field: FieldRef, min: usize) -> MinLength {
    MinLength { field, min }
}

#[async_trait]
impl Check for MinLength {
    fn field(&self) -> &FieldRef {
        &self.field
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), ValidationFailure> {
        let ok = ctx
            .value_of(&self.field)
            .and_then(Value::as_str)
            .map(|s| s.chars().count() >= self.min)
            .unwrap_or(false);
        if ok {
            Ok(())
        } else {
            Err(ValidationFailure::new(
                &self.field,
                format!("must be at least {} characters", self.min),
            ))
        }
    }
}

/// 24 hexadecimal characters, the document id format of the store.
pub struct IsObjectId {
    field: FieldRef,
}

pub fn is_object_id(field: FieldRef) -> IsObjectId {
    IsObjectId { field }
}

fn is_valid_object_id(value: &str) -> bool {
    value.len() == 24 && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl Check for IsObjectId {
    fn field(&self) -> &FieldRef {
        &self.field
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), ValidationFailure> {
        match as_nonempty_str(ctx.value_of(&self.field)) {
            Some(s) if is_valid_object_id(s) => Ok(()),
            _ => Err(ValidationFailure::new(&self.field, "is not a valid object id")),
        }
    }
}

/// User records are keyed by UUID rather than document object ids.
pub struct IsUuid {
    field: FieldRef,
}

pub fn is_uuid(field: FieldRef) -> IsUuid {
    IsUuid { field }
}

#[async_trait]
impl Check for IsUuid {
    fn field(&self) -> &FieldRef {
        &self.field
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), ValidationFailure> {
        match as_nonempty_str(ctx.value_of(&self.field)) {
            Some(s) if s.parse::<uuid::Uuid>().is_ok() => Ok(()),
            _ => Err(ValidationFailure::new(&self.field, "is not a valid uuid")),
        }
    }
}

/// Referential check: the referenced document exists and is active. A store
/// failure is captured as a failure on the field, never a silent pass.
pub struct ExistsAndActive {
    field: FieldRef,
    collection: Collection,
}

pub fn exists_and_active(field: FieldRef, collection: Collection) -> ExistsAndActive {
    ExistsAndActive { field, collection }
}

#[async_trait]
impl Check for ExistsAndActive {
    fn field(&self) -> &FieldRef {
        &self.field
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), ValidationFailure> {
        let Some(id) = as_nonempty_str(ctx.value_of(&self.field)) else {
            return Err(ValidationFailure::new(&self.field, "is required"));
        };
        match ctx.store().exists_active(self.collection, id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ValidationFailure::new(
                &self.field,
                format!("no {} found with id {}", self.collection.singular(), id),
            )),
            Err(err) => {
                tracing::error!(
                    collection = %self.collection,
                    error = %err,
                    "referential check could not reach the store"
                );
                Err(ValidationFailure::new(&self.field, "could not be verified"))
            }
        }
    }
}

/// Referential check: the value is unused for `stored_field` among the
/// collection's active documents.
pub struct UniqueAcrossActive {
    field: FieldRef,
    collection: Collection,
    stored_field: &'static str,
}

pub fn unique_across_active(
    field: FieldRef,
    collection: Collection,
    stored_field: &'static str,
) -> UniqueAcrossActive {
    UniqueAcrossActive {
        field,
        collection,
        stored_field,
    }
}

#[async_trait]
impl Check for UniqueAcrossActive {
    fn field(&self) -> &FieldRef {
        &self.field
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), ValidationFailure> {
        let Some(value) = as_nonempty_str(ctx.value_of(&self.field)) else {
            return Err(ValidationFailure::new(&self.field, "is required"));
        };
        match ctx
            .store()
            .is_unique_active(self.collection, self.stored_field, value)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(ValidationFailure::new(
                &self.field,
                format!("{} is already registered", value),
            )),
            Err(err) => {
                tracing::error!(
                    collection = %self.collection,
                    error = %err,
                    "uniqueness check could not reach the store"
                );
                Err(ValidationFailure::new(&self.field, "could not be verified"))
            }
        }
    }
}

/// The named role exists in the roles collection.
pub struct RoleIsRegistered {
    field: FieldRef,
}

pub fn role_is_registered(field: FieldRef) -> RoleIsRegistered {
    RoleIsRegistered { field }
}

#[async_trait]
impl Check for RoleIsRegistered {
    fn field(&self) -> &FieldRef {
        &self.field
    }

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), ValidationFailure> {
        let Some(name) = as_nonempty_str(ctx.value_of(&self.field)) else {
            return Err(ValidationFailure::new(&self.field, "is required"));
        };
        match ctx.store().find_role(name).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(ValidationFailure::new(
                &self.field,
                format!("role {} is not registered", name),
            )),
            Err(err) => {
                tracing::error!(error = %err, "role check could not reach the store");
                Err(ValidationFailure::new(&self.field, "could not be verified"))
            }
        }
    }
}
