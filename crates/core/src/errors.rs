use thiserror::Error;

use crate::domain::request::{RequestId, RequestStatus};
use crate::policy::Denial;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid request transition from {from} to {to}")]
    InvalidRequestTransition { from: RequestStatus, to: RequestStatus },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Outcome kinds of the request lifecycle operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("could not load requests: {0}")]
    LoadFailed(String),
    #[error("could not create request: {0}")]
    CreateFailed(String),
    #[error("could not update request: {0}")]
    UpdateFailed(String),
    #[error("unauthorized: {0}")]
    Unauthorized(Denial),
    #[error("request `{id}` was already processed; reload before retrying")]
    AlreadyProcessed { id: RequestId },
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("request `{id}` is not in the current view; reload before retrying")]
    UnknownRequest { id: RequestId },
}

impl LifecycleError {
    /// Whether the caller has to reload before the same action can succeed.
    pub fn requires_reload(&self) -> bool {
        matches!(self, Self::AlreadyProcessed { .. } | Self::UnknownRequest { .. })
    }
}

impl From<DomainError> for LifecycleError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvariantViolation(message) => Self::ValidationFailed(message),
            other => Self::ValidationFailed(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::Conflict { .. } => {
                "This request was already processed or changed. Refresh the list and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The inventory service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl LifecycleError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self {
            Self::ValidationFailed(_) => InterfaceError::BadRequest { message, correlation_id },
            Self::Unauthorized(_) => InterfaceError::Forbidden { message, correlation_id },
            Self::AlreadyProcessed { .. } | Self::UnknownRequest { .. } => {
                InterfaceError::Conflict { message, correlation_id }
            }
            Self::LoadFailed(_) | Self::CreateFailed(_) | Self::UpdateFailed(_) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}
