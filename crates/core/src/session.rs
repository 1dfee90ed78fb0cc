use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::actor::Actor;
use crate::errors::DomainError;

/// The authenticated actor a lifecycle manager acts for.
///
/// Sessions are handed to the manager explicitly; there is no process-wide current user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    actor: Actor,
    correlation_id: String,
}

impl Session {
    pub fn new(actor: Actor) -> Result<Self, DomainError> {
        Self::with_correlation_id(actor, Uuid::new_v4().to_string())
    }

    pub fn with_correlation_id(
        actor: Actor,
        correlation_id: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if !actor.is_active() {
            return Err(DomainError::InvariantViolation(format!(
                "actor `{}` is inactive and cannot open a session",
                actor.id
            )));
        }

        Ok(Self { actor, correlation_id: correlation_id.into() })
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}
