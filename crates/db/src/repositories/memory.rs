use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use stockroom_core::domain::request::{Request, RequestId, RequestStatus, ValidatedRequest};
use stockroom_core::store::{RequestQuery, RequestStore, StatusPatch, StoreError, UpdateGuard};

/// Request table kept in process. The write lock makes each guarded update atomic.
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<Vec<Request>>,
}

impl InMemoryRequestStore {
    pub fn with_requests(requests: Vec<Request>) -> Self {
        Self { requests: RwLock::new(requests) }
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn select(&self, query: &RequestQuery) -> Result<Vec<Request>, StoreError> {
        let requests = self.requests.read().await;
        let mut rows: Vec<Request> =
            requests.iter().filter(|request| query.matches(request)).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn insert(
        &self,
        request: ValidatedRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Request, StoreError> {
        let row = Request {
            id: RequestId(Uuid::new_v4().to_string()),
            requester_id: request.requester_id,
            product_id: request.product_id,
            title: request.title,
            reason: request.reason,
            quantity: request.quantity,
            status: RequestStatus::Pending,
            requester_name: None,
            product_name: None,
            created_at,
            updated_at: created_at,
        };
        self.requests.write().await.push(row.clone());
        Ok(row)
    }

    async fn update_where(
        &self,
        id: &RequestId,
        guard: &UpdateGuard,
        patch: &StatusPatch,
    ) -> Result<Option<Request>, StoreError> {
        let mut requests = self.requests.write().await;
        let Some(row) = requests.iter_mut().find(|row| &row.id == id && guard.matches(row)) else {
            return Ok(None);
        };

        row.status = patch.status;
        row.updated_at = patch.updated_at;
        if let Some(reason) = &patch.reason {
            row.reason = Some(reason.clone());
        }
        Ok(Some(row.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use stockroom_core::domain::actor::ActorId;
    use stockroom_core::domain::product::ProductId;
    use stockroom_core::domain::request::{RequestStatus, ValidatedRequest};
    use stockroom_core::store::{RequestQuery, RequestStore, StatusPatch, UpdateGuard};

    use crate::repositories::InMemoryRequestStore;

    fn bolts() -> ValidatedRequest {
        ValidatedRequest {
            requester_id: ActorId("u1".to_string()),
            product_id: ProductId("p1".to_string()),
            title: "Need bolts".to_string(),
            reason: None,
            quantity: 5,
        }
    }

    #[tokio::test]
    async fn in_memory_store_guards_updates() {
        let store = InMemoryRequestStore::default();
        let created = store.insert(bolts(), Utc::now()).await.expect("insert");
        let patch = StatusPatch {
            status: RequestStatus::Accepted,
            reason: None,
            updated_at: Utc::now(),
        };

        let first = store.update_where(&created.id, &UpdateGuard::pending(), &patch).await;
        let second = store.update_where(&created.id, &UpdateGuard::pending(), &patch).await;

        assert!(first.expect("first").is_some());
        assert!(second.expect("second").is_none());
    }

    #[tokio::test]
    async fn in_memory_store_resolves_racing_updates() {
        let store = Arc::new(InMemoryRequestStore::default());
        let created = store.insert(bolts(), Utc::now()).await.expect("insert");

        let mut handles = Vec::new();
        for status in [RequestStatus::Accepted, RequestStatus::Rejected, RequestStatus::Accepted] {
            let store = Arc::clone(&store);
            let id = created.id.clone();
            handles.push(tokio::spawn(async move {
                let patch = StatusPatch { status, reason: None, updated_at: Utc::now() };
                store.update_where(&id, &UpdateGuard::pending(), &patch).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.expect("join").expect("update").is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let rows = store.select(&RequestQuery::default()).await.expect("select");
        assert_ne!(rows[0].status, RequestStatus::Pending);
    }
}
