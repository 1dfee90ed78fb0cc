//! Contract for the remote request table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::actor::ActorId;
use crate::domain::product::ProductId;
use crate::domain::request::{Request, RequestId, RequestStatus, ValidatedRequest};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("store returned an undecodable row: {0}")]
    Decode(String),
}

/// Filters pushed down to the store. All present filters must match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestQuery {
    pub request_id: Option<RequestId>,
    pub requester_id: Option<ActorId>,
    pub status: Option<RequestStatus>,
    pub product_id: Option<ProductId>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl RequestQuery {
    pub fn by_id(id: &RequestId) -> Self {
        Self { request_id: Some(id.clone()), ..Self::default() }
    }

    pub fn matches(&self, request: &Request) -> bool {
        self.request_id.as_ref().map_or(true, |id| id == &request.id)
            && self.requester_id.as_ref().map_or(true, |id| id == &request.requester_id)
            && self.status.map_or(true, |status| status == request.status)
            && self.product_id.as_ref().map_or(true, |id| id == &request.product_id)
            && self.created_from.map_or(true, |from| request.created_at >= from)
            && self.created_to.map_or(true, |to| request.created_at <= to)
    }
}

/// Conditions an update must satisfy against the stored row (compare-and-set).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateGuard {
    pub expected_status: RequestStatus,
    pub requester_id: Option<ActorId>,
}

impl UpdateGuard {
    pub fn pending() -> Self {
        Self { expected_status: RequestStatus::Pending, requester_id: None }
    }

    pub fn pending_for(requester_id: ActorId) -> Self {
        Self { expected_status: RequestStatus::Pending, requester_id: Some(requester_id) }
    }

    pub fn matches(&self, request: &Request) -> bool {
        request.status == self.expected_status
            && self.requester_id.as_ref().map_or(true, |id| id == &request.requester_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusPatch {
    pub status: RequestStatus,
    pub reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Rows matching `query`, newest first.
    async fn select(&self, query: &RequestQuery) -> Result<Vec<Request>, StoreError>;

    /// Inserts a pending request and returns the row as stored.
    async fn insert(
        &self,
        request: ValidatedRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Request, StoreError>;

    /// Applies `patch` only if the stored row satisfies `guard`.
    ///
    /// `Ok(None)` means no row matched; it is not an error.
    async fn update_where(
        &self,
        id: &RequestId,
        guard: &UpdateGuard,
        patch: &StatusPatch,
    ) -> Result<Option<Request>, StoreError>;
}
