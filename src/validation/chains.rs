//! Per-route validation chains. Each route declares its checks here so the
//! shape of every gate is visible in one place.

use crate::store::Collection;

use super::checks::{
    exists_and_active, is_email, is_object_id, is_uuid, min_length, required, role_is_registered,
    unique_across_active,
};
use super::{body, path, ValidationChain};

/// POST /auth/login
pub fn login() -> ValidationChain {
    ValidationChain::new()
        .check(is_email(body("email")))
        .check(required(body("password")))
}

/// POST /auth/google
pub fn federated_login() -> ValidationChain {
    ValidationChain::new().check(required(body("id_token")))
}

/// Creating a user: every field failure comes back in one response, but the
/// uniqueness and role lookups only run once their field is structurally
/// sound.
pub fn user_create() -> ValidationChain {
    ValidationChain::new()
        .check(required(body("name")))
        .check(min_length(body("password"), 6))
        .check(is_email(body("email")))
        .then(unique_across_active(body("email"), Collection::Users, "email"))
        .check(required(body("role")))
        .then(role_is_registered(body("role")))
}

/// Routes addressing a user by id. Users are keyed by UUID, unlike the
/// object-id keyed document collections.
pub fn user_by_id() -> ValidationChain {
    ValidationChain::new()
        .check(is_uuid(path("id")))
        .then(exists_and_active(path("id"), Collection::Users))
}

/// POST /api/categories
pub fn category_create() -> ValidationChain {
    ValidationChain::new().check(required(body("name")))
}

/// Routes addressing a category by id.
pub fn category_by_id() -> ValidationChain {
    ValidationChain::new()
        .check(is_object_id(path("id")))
        .then(exists_and_active(path("id"), Collection::Categories))
}

/// PUT /api/categories/:id
pub fn category_update() -> ValidationChain {
    ValidationChain::new()
        .check(required(body("name")))
        .check(is_object_id(path("id")))
        .then(exists_and_active(path("id"), Collection::Categories))
}

/// POST /api/products: the category reference must be a well-formed id
/// before the existence lookup runs.
pub fn product_create() -> ValidationChain {
    ValidationChain::new()
        .check(required(body("name")))
        .check(is_object_id(body("category")))
        .then(exists_and_active(body("category"), Collection::Categories))
}

/// Routes addressing a product by id.
pub fn product_by_id() -> ValidationChain {
    ValidationChain::new()
        .check(is_object_id(path("id")))
        .then(exists_and_active(path("id"), Collection::Products))
}
