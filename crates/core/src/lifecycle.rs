//! Session-scoped request lifecycle: load, create and role-gated status transitions.
//!
//! The manager keeps a read-through cache of the requests visible to its session. The cache
//! only ever changes from rows returned by the store, never from what the caller asked for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink};
use crate::domain::actor::ActorId;
use crate::domain::product::ProductId;
use crate::domain::request::{NewRequest, Request, RequestId, RequestStatus};
use crate::errors::LifecycleError;
use crate::policy::{self, Denial, Transition};
use crate::session::Session;
use crate::store::{RequestQuery, RequestStore, StatusPatch, UpdateGuard};

pub const DEFAULT_CANCELLATION_REASON: &str = "cancelled by requester";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadFilter {
    pub requester_id: Option<ActorId>,
    pub status: Option<RequestStatus>,
    pub product_id: Option<ProductId>,
    pub q: Option<String>,
}

#[derive(Default)]
struct CacheState {
    requests: Vec<Request>,
    applied_load: u64,
}

pub struct RequestLifecycleManager<S> {
    store: Arc<S>,
    session: Session,
    audit: Arc<dyn AuditSink>,
    cancellation_reason: String,
    cache: RwLock<CacheState>,
    load_sequence: AtomicU64,
}

impl<S: RequestStore> RequestLifecycleManager<S> {
    pub fn new(store: Arc<S>, session: Session) -> Self {
        Self {
            store,
            session,
            audit: Arc::new(TracingAuditSink),
            cancellation_reason: DEFAULT_CANCELLATION_REASON.to_string(),
            cache: RwLock::new(CacheState::default()),
            load_sequence: AtomicU64::new(0),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_cancellation_reason(mut self, reason: impl Into<String>) -> Self {
        self.cancellation_reason = reason.into();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.cache.read().await.requests.clone()
    }

    pub async fn get(&self, id: &RequestId) -> Option<Request> {
        self.cache.read().await.requests.iter().find(|request| &request.id == id).cloned()
    }

    /// Fetches the requests visible to the session and replaces the cache with them.
    ///
    /// Administrators see every request; anyone else only their own, whatever the filter says.
    /// If several loads overlap, only the most recently issued one may replace the cache.
    pub async fn load(&self, filter: LoadFilter) -> Result<Vec<Request>, LifecycleError> {
        let ticket = self.load_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let query = self.scoped_query(&filter);

        let rows = match self.store.select(&query).await {
            Ok(rows) => rows,
            Err(error) => {
                warn!(
                    event_name = "lifecycle.request.load_failed",
                    correlation_id = %self.session.correlation_id(),
                    actor_id = %self.session.actor().id,
                    error = %error,
                    "request load failed; keeping previous view"
                );
                return Err(LifecycleError::LoadFailed(error.to_string()));
            }
        };

        let visible = match filter.q.as_deref() {
            Some(needle) => rows.into_iter().filter(|row| row.matches_text(needle)).collect(),
            None => rows,
        };

        let mut cache = self.cache.write().await;
        if ticket > cache.applied_load {
            cache.requests = visible.clone();
            cache.applied_load = ticket;
        } else {
            debug!(
                event_name = "lifecycle.request.load_superseded",
                correlation_id = %self.session.correlation_id(),
                ticket,
                applied_load = cache.applied_load,
                "discarding result of a superseded load"
            );
        }

        info!(
            event_name = "lifecycle.request.loaded",
            correlation_id = %self.session.correlation_id(),
            actor_id = %self.session.actor().id,
            count = visible.len(),
            "requests loaded"
        );

        Ok(visible)
    }

    pub async fn create(&self, input: NewRequest) -> Result<Request, LifecycleError> {
        let actor = self.session.actor();

        let validated = match input.validate() {
            Ok(validated) => validated,
            Err(error) => {
                let error = LifecycleError::from(error);
                self.record(None, "request.create", AuditOutcome::Rejected, &error.to_string());
                return Err(error);
            }
        };

        if let Err(denial) = policy::can_create(actor, &validated.requester_id) {
            self.record(None, "request.create", AuditOutcome::Rejected, &denial.reason());
            return Err(LifecycleError::Unauthorized(denial));
        }

        let created = match self.store.insert(validated, Utc::now()).await {
            Ok(created) => created,
            Err(error) => {
                self.record(None, "request.create", AuditOutcome::Failed, &error.to_string());
                return Err(LifecycleError::CreateFailed(error.to_string()));
            }
        };

        self.cache.write().await.requests.insert(0, created.clone());
        self.record(Some(&created.id), "request.create", AuditOutcome::Success, "created");
        info!(
            event_name = "lifecycle.request.created",
            correlation_id = %self.session.correlation_id(),
            request_id = %created.id,
            requester_id = %created.requester_id,
            product_id = %created.product_id,
            quantity = created.quantity,
            "request created"
        );

        Ok(created)
    }

    pub async fn approve(&self, id: &RequestId) -> Result<Request, LifecycleError> {
        self.transition(id, Transition::Approve, UpdateGuard::pending(), None).await
    }

    pub async fn reject(&self, id: &RequestId) -> Result<Request, LifecycleError> {
        self.transition(id, Transition::Reject, UpdateGuard::pending(), None).await
    }

    /// Withdraws a pending request. The record stays, marked rejected with the cancellation reason.
    pub async fn cancel(
        &self,
        id: &RequestId,
        actor_id: &ActorId,
    ) -> Result<Request, LifecycleError> {
        let session_actor_id = &self.session.actor().id;
        if session_actor_id != actor_id {
            let denial = Denial::ActorMismatch {
                session_actor_id: session_actor_id.clone(),
                claimed_actor_id: actor_id.clone(),
            };
            self.record(Some(id), "request.cancel", AuditOutcome::Rejected, &denial.reason());
            return Err(LifecycleError::Unauthorized(denial));
        }

        let reason = Some(self.cancellation_reason.clone());
        self.transition(id, Transition::Cancel, UpdateGuard::pending_for(actor_id.clone()), reason)
            .await
    }

    async fn transition(
        &self,
        id: &RequestId,
        transition: Transition,
        guard: UpdateGuard,
        reason: Option<String>,
    ) -> Result<Request, LifecycleError> {
        let event_type = format!("request.{transition}");

        let cached = match self.get(id).await {
            Some(cached) => cached,
            None if transition == Transition::Cancel => {
                self.lookup_for_cancel(id, &event_type).await?
            }
            None => {
                self.record(Some(id), &event_type, AuditOutcome::Rejected, "not in current view");
                return Err(LifecycleError::UnknownRequest { id: id.clone() });
            }
        };

        if let Err(denial) = policy::evaluate(&cached, self.session.actor(), transition) {
            self.record(Some(id), &event_type, AuditOutcome::Rejected, &denial.reason());
            return Err(match denial {
                Denial::AlreadyTerminal { .. } => LifecycleError::AlreadyProcessed { id: id.clone() },
                other => LifecycleError::Unauthorized(other),
            });
        }

        let now = Utc::now();
        let mut expected = cached.clone();
        if let Err(error) = expected.transition_to(transition.target_status(), now) {
            self.record(Some(id), &event_type, AuditOutcome::Rejected, &error.to_string());
            return Err(LifecycleError::AlreadyProcessed { id: id.clone() });
        }

        let patch = StatusPatch { status: expected.status, reason, updated_at: expected.updated_at };

        match self.store.update_where(id, &guard, &patch).await {
            Ok(Some(updated)) => {
                self.replace_cached(updated.clone()).await;
                self.record(Some(id), &event_type, AuditOutcome::Success, updated.status.as_str());
                info!(
                    event_name = "lifecycle.request.transitioned",
                    correlation_id = %self.session.correlation_id(),
                    request_id = %id,
                    transition = %transition,
                    from = %cached.status,
                    to = %updated.status,
                    actor_id = %self.session.actor().id,
                    "request status changed"
                );
                Ok(updated)
            }
            Ok(None) => {
                self.record(Some(id), &event_type, AuditOutcome::Rejected, "guard did not match");
                warn!(
                    event_name = "lifecycle.request.already_processed",
                    correlation_id = %self.session.correlation_id(),
                    request_id = %id,
                    transition = %transition,
                    "guarded update matched no rows; request changed since last load"
                );
                Err(LifecycleError::AlreadyProcessed { id: id.clone() })
            }
            Err(error) => {
                self.record(Some(id), &event_type, AuditOutcome::Failed, &error.to_string());
                warn!(
                    event_name = "lifecycle.request.update_failed",
                    correlation_id = %self.session.correlation_id(),
                    request_id = %id,
                    transition = %transition,
                    error = %error,
                    "guarded update failed"
                );
                Err(LifecycleError::UpdateFailed(error.to_string()))
            }
        }
    }

    /// Employees only cache their own requests, so a cancel aimed at a colleague's request
    /// misses the cache. Read the row directly so policy can judge it; the cache is not touched.
    async fn lookup_for_cancel(
        &self,
        id: &RequestId,
        event_type: &str,
    ) -> Result<Request, LifecycleError> {
        let rows = match self.store.select(&RequestQuery::by_id(id)).await {
            Ok(rows) => rows,
            Err(error) => {
                self.record(Some(id), event_type, AuditOutcome::Failed, &error.to_string());
                return Err(LifecycleError::UpdateFailed(error.to_string()));
            }
        };

        match rows.into_iter().next() {
            Some(row) => Ok(row),
            None => {
                self.record(Some(id), event_type, AuditOutcome::Rejected, "no such request");
                Err(LifecycleError::UnknownRequest { id: id.clone() })
            }
        }
    }

    fn scoped_query(&self, filter: &LoadFilter) -> RequestQuery {
        let actor = self.session.actor();
        let requester_id =
            if actor.is_admin() { filter.requester_id.clone() } else { Some(actor.id.clone()) };

        RequestQuery {
            requester_id,
            status: filter.status,
            product_id: filter.product_id.clone(),
            ..RequestQuery::default()
        }
    }

    async fn replace_cached(&self, updated: Request) {
        let mut cache = self.cache.write().await;
        match cache.requests.iter_mut().find(|request| request.id == updated.id) {
            Some(slot) => *slot = updated,
            None => cache.requests.insert(0, updated),
        }
    }

    fn record(&self, request_id: Option<&RequestId>, event_type: &str, outcome: AuditOutcome, detail: &str) {
        let category = match outcome {
            AuditOutcome::Success => AuditCategory::Lifecycle,
            AuditOutcome::Rejected => AuditCategory::Authorization,
            AuditOutcome::Failed => AuditCategory::Persistence,
        };
        self.audit.emit(
            AuditEvent::new(
                request_id.cloned(),
                self.session.correlation_id(),
                event_type,
                category,
                self.session.actor().id.0.clone(),
                outcome,
            )
            .with_metadata("detail", detail),
        );
    }
}
