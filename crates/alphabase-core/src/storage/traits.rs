//! Collaborator interfaces the store consumes.
//!
//! The embedding application supplies these: a schema validator consulted by
//! `set`, and observers that receive mutation events (an audit log, a cache
//! invalidator, metrics). The store itself stays ignorant of what observers do.

use serde_json::Value;

use super::types::MutationEvent;

/// Outcome of validating one value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationOutcome {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self { ok: false, errors }
    }
}

/// Validates values before they are written.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, value: &Value) -> ValidationOutcome;
}

/// Receives every mutation after it has been applied.
///
/// Observers run outside the store lock, so they may call back into the store.
pub trait MutationObserver: Send + Sync {
    fn on_mutation(&self, event: &MutationEvent);
}

impl<F> MutationObserver for F
where
    F: Fn(&MutationEvent) + Send + Sync,
{
    fn on_mutation(&self, event: &MutationEvent) {
        self(event)
    }
}
