use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use axum::{extract::Request, middleware::Next, response::Response};
use thiserror::Error;

use crate::error::ApiError;
use crate::store::{Principal, Role};

/// Non-empty set of acceptable roles for a route. Flat and closed: a
/// principal passes iff its role is a member, nothing inherits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn of(role: Role) -> Self {
        Self(BTreeSet::from([role]))
    }

    pub fn with(mut self, role: Role) -> Self {
        self.0.insert(role);
        self
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::fmt::Display for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for role in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(role.as_str())?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    /// The resolver never ran on this request: a server wiring defect, not
    /// a client error, and reported as such.
    #[error("token validation must run before role checks")]
    NoPrincipalResolved,
    /// An empty requirement fails closed, never open.
    #[error("route is configured with no acceptable roles")]
    EmptyRequirement,
    #[error("{name} does not have one of the required roles: {required}")]
    InsufficientRole { name: String, required: String },
}

/// The one decision point: allow iff the resolved principal's role is in the
/// requirement set. Both the set check and the single-role convenience go
/// through here.
pub fn authorize(principal: Option<&Principal>, required: &RoleSet) -> Result<(), GateError> {
    let principal = principal.ok_or(GateError::NoPrincipalResolved)?;
    if required.is_empty() {
        return Err(GateError::EmptyRequirement);
    }
    if required.contains(principal.role) {
        Ok(())
    } else {
        tracing::warn!(
            user = %principal.email,
            role = %principal.role,
            required = %required,
            "capability gate rejected request"
        );
        Err(GateError::InsufficientRole {
            name: principal.name.clone(),
            required: required.to_string(),
        })
    }
}

/// Single-role check, the one-element case of [`authorize`].
pub fn authorize_role(principal: Option<&Principal>, role: Role) -> Result<(), GateError> {
    authorize(principal, &RoleSet::of(role))
}

type GateFuture = Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send>>;

/// Middleware factory enforcing a role requirement. Mount after
/// `principal_middleware`; a request arriving here without a resolved
/// principal reports a misconfigured pipeline, not a 401.
pub fn require_roles(required: RoleSet) -> impl Fn(Request, Next) -> GateFuture + Clone {
    move |request: Request, next: Next| {
        let required = required.clone();
        Box::pin(async move {
            authorize(request.extensions().get::<Principal>(), &required)?;
            Ok(next.run(request).await)
        })
    }
}

/// Admin-only gate, the common case.
pub fn require_admin() -> impl Fn(Request, Next) -> GateFuture + Clone {
    require_roles(RoleSet::of(Role::Admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role,
            active: true,
            federated: false,
            password_hash: None,
        }
    }

    #[test]
    fn allows_member_roles_and_rejects_others() {
        let admin_or_sales = RoleSet::of(Role::Admin).with(Role::Sales);
        assert!(authorize(Some(&principal(Role::Admin)), &admin_or_sales).is_ok());
        assert!(authorize(Some(&principal(Role::Sales)), &admin_or_sales).is_ok());
        assert!(matches!(
            authorize(Some(&principal(Role::User)), &admin_or_sales),
            Err(GateError::InsufficientRole { .. })
        ));
    }

    #[test]
    fn widening_the_requirement_never_revokes_access() {
        let p = principal(Role::Sales);
        let narrow = RoleSet::of(Role::Sales);
        assert!(authorize(Some(&p), &narrow).is_ok());
        for extra in [Role::Admin, Role::User] {
            let widened = narrow.clone().with(extra);
            assert!(authorize(Some(&p), &widened).is_ok());
        }
    }

    #[test]
    fn empty_requirement_fails_closed() {
        assert!(matches!(
            authorize(Some(&principal(Role::Admin)), &RoleSet::default()),
            Err(GateError::EmptyRequirement)
        ));
    }

    #[test]
    fn missing_principal_is_a_pipeline_defect() {
        assert!(matches!(
            authorize(None, &RoleSet::of(Role::Admin)),
            Err(GateError::NoPrincipalResolved)
        ));
    }

    #[test]
    fn lowercase_stored_role_passes_an_admin_requirement() {
        // The closed enum normalizes case at parse time, so "admin" from
        // a legacy document still satisfies an ADMIN requirement.
        let role = Role::parse("admin").unwrap();
        assert!(authorize_role(Some(&principal(role)), Role::Admin).is_ok());
    }

    #[test]
    fn single_role_check_matches_the_set_check() {
        let p = principal(Role::User);
        assert_eq!(
            authorize_role(Some(&p), Role::User).is_ok(),
            authorize(Some(&p), &RoleSet::of(Role::User)).is_ok()
        );
        assert_eq!(
            authorize_role(Some(&p), Role::Admin).is_ok(),
            authorize(Some(&p), &RoleSet::of(Role::Admin)).is_ok()
        );
    }
}
