//! Declarative per-field validation. A chain is an ordered list of checks,
//! sync or referential, run against one inbound payload. Every independent
//! check executes so the caller gets all violations in one round trip; a
//! dependent check is skipped, never failed, when its prerequisite already
//! failed.

pub mod chains;
pub mod checks;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;

use crate::store::DocumentStore;

/// Where a field lives in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Location {
    #[serde(rename = "body")]
    Body,
    #[serde(rename = "params")]
    Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub name: String,
    pub location: Location,
}

/// Field in the request body.
pub fn body(name: &str) -> FieldRef {
    FieldRef {
        name: name.to_string(),
        location: Location::Body,
    }
}

/// Field in the request path parameters.
pub fn path(name: &str) -> FieldRef {
    FieldRef {
        name: name.to_string(),
        location: Location::Path,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub field: String,
    pub message: String,
    pub location: Location,
}

impl ValidationFailure {
    pub fn new(field: &FieldRef, message: impl Into<String>) -> Self {
        Self {
            field: field.name.clone(),
            message: message.into(),
            location: field.location,
        }
    }
}

/// Ordered collection of failures; empty means the payload passed. A chain
/// run always produces exactly one report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationReport {
    failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }
}

impl From<Vec<ValidationFailure>> for ValidationReport {
    fn from(failures: Vec<ValidationFailure>) -> Self {
        Self { failures }
    }
}

/// Payload view handed to each check, plus the store handle referential
/// checks read through.
pub struct CheckContext<'a> {
    body: &'a Value,
    params: &'a Value,
    store: &'a Arc<dyn DocumentStore>,
}

static NO_PARAMS: Value = Value::Null;

impl<'a> CheckContext<'a> {
    pub fn new(body: &'a Value, params: &'a Value, store: &'a Arc<dyn DocumentStore>) -> Self {
        Self { body, params, store }
    }

    pub fn body_only(body: &'a Value, store: &'a Arc<dyn DocumentStore>) -> Self {
        Self::new(body, &NO_PARAMS, store)
    }

    pub fn value_of(&self, field: &FieldRef) -> Option<&'a Value> {
        let source = match field.location {
            Location::Body => self.body,
            Location::Path => self.params,
        };
        source.get(&field.name)
    }

    pub fn store(&self) -> &'a Arc<dyn DocumentStore> {
        self.store
    }
}

/// One field-level check. Sync structural checks and async referential
/// checks share this trait; the runner does not care which is which.
#[async_trait]
pub trait Check: Send + Sync {
    fn field(&self) -> &FieldRef;

    async fn run(&self, ctx: &CheckContext<'_>) -> Result<(), ValidationFailure>;
}

struct Link {
    check: Box<dyn Check>,
    dependent: bool,
}

/// Ordered chain of checks with declared prerequisite pairs.
#[derive(Default)]
pub struct ValidationChain {
    links: Vec<Link>,
}

impl ValidationChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an independent check.
    pub fn check(mut self, check: impl Check + 'static) -> Self {
        self.links.push(Link {
            check: Box::new(check),
            dependent: false,
        });
        self
    }

    /// Appends a check that only runs if the previously appended check
    /// passed. Skipped prerequisites do not produce duplicate failures.
    pub fn then(mut self, check: impl Check + 'static) -> Self {
        let dependent = !self.links.is_empty();
        self.links.push(Link {
            check: Box::new(check),
            dependent,
        });
        self
    }

    /// Runs every check. Independent strands execute concurrently; failures
    /// come back in declared order regardless of completion order.
    pub async fn run(&self, ctx: &CheckContext<'_>) -> ValidationReport {
        let mut strands: Vec<Vec<usize>> = Vec::new();
        for (idx, link) in self.links.iter().enumerate() {
            match strands.last_mut() {
                Some(strand) if link.dependent => strand.push(idx),
                _ => strands.push(vec![idx]),
            }
        }

        let results = join_all(strands.iter().map(|strand| self.run_strand(strand, ctx))).await;

        let mut failures: Vec<(usize, ValidationFailure)> =
            results.into_iter().flatten().collect();
        failures.sort_by_key(|(idx, _)| *idx);
        ValidationReport::from(failures.into_iter().map(|(_, f)| f).collect::<Vec<_>>())
    }

    async fn run_strand(
        &self,
        strand: &[usize],
        ctx: &CheckContext<'_>,
    ) -> Vec<(usize, ValidationFailure)> {
        let mut out = Vec::new();
        for &idx in strand {
            let check = &self.links[idx].check;
            if !out.is_empty() {
                tracing::debug!(
                    field = %check.field().name,
                    "skipping dependent check, prerequisite failed"
                );
                break;
            }
            if let Err(failure) = check.run(ctx).await {
                tracing::debug!(
                    field = %failure.field,
                    message = %failure.message,
                    "validation check failed"
                );
                out.push((idx, failure));
            }
        }
        out
    }
}
