use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use stockroom_core::domain::actor::ActorId;
use stockroom_core::domain::product::ProductId;
use stockroom_core::domain::request::{Request, RequestId, RequestStatus, ValidatedRequest};
use stockroom_core::store::{RequestQuery, RequestStore, StatusPatch, StoreError, UpdateGuard};

use super::{decode_error, decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

const REQUEST_SELECT: &str = "SELECT r.id, r.user_id, r.product_id, r.title, r.reason, r.status,
        r.quantity, r.created_at, r.updated_at,
        u.name AS requester_name, p.name AS product_name
     FROM requests r
     LEFT JOIN users u ON u.id = r.user_id
     LEFT JOIN products p ON p.id = r.product_id";

/// `RequestStore` over the `requests` table. Transitions are a single guarded `UPDATE`, so two
/// callers racing on the same pending row cannot both succeed.
pub struct SqlRequestStore {
    pool: DbPool,
}

impl SqlRequestStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!("{REQUEST_SELECT} WHERE r.id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_request).transpose()
    }

    async fn select_rows(&self, query: &RequestQuery) -> Result<Vec<Request>, RepositoryError> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(REQUEST_SELECT);
        builder.push(" WHERE 1=1");

        if let Some(id) = &query.request_id {
            builder.push(" AND r.id = ");
            builder.push_bind(id.0.clone());
        }
        if let Some(requester_id) = &query.requester_id {
            builder.push(" AND r.user_id = ");
            builder.push_bind(requester_id.0.clone());
        }
        if let Some(status) = query.status {
            builder.push(" AND r.status = ");
            builder.push_bind(status.as_str());
        }
        if let Some(product_id) = &query.product_id {
            builder.push(" AND r.product_id = ");
            builder.push_bind(product_id.0.clone());
        }
        if let Some(from) = query.created_from {
            builder.push(" AND r.created_at >= ");
            builder.push_bind(encode_timestamp(from));
        }
        if let Some(to) = query.created_to {
            builder.push(" AND r.created_at <= ");
            builder.push_bind(encode_timestamp(to));
        }

        builder.push(" ORDER BY r.created_at DESC, r.id DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_request).collect()
    }

    async fn insert_row(
        &self,
        request: ValidatedRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Request, RepositoryError> {
        let id = RequestId(Uuid::new_v4().to_string());
        let timestamp = encode_timestamp(created_at);

        sqlx::query(
            "INSERT INTO requests (id, user_id, product_id, title, reason, status, quantity,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(&request.requester_id.0)
        .bind(&request.product_id.0)
        .bind(&request.title)
        .bind(&request.reason)
        .bind(RequestStatus::Pending.as_str())
        .bind(i64::from(request.quantity))
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("inserted request `{id}` not found")))
    }

    async fn update_row(
        &self,
        id: &RequestId,
        guard: &UpdateGuard,
        patch: &StatusPatch,
    ) -> Result<Option<Request>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("UPDATE requests SET status = ");
        builder.push_bind(patch.status.as_str());
        builder.push(", updated_at = ");
        builder.push_bind(encode_timestamp(patch.updated_at));
        if let Some(reason) = &patch.reason {
            builder.push(", reason = ");
            builder.push_bind(reason.clone());
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id.0.clone());
        builder.push(" AND status = ");
        builder.push_bind(guard.expected_status.as_str());
        if let Some(requester_id) = &guard.requester_id {
            builder.push(" AND user_id = ");
            builder.push_bind(requester_id.0.clone());
        }

        let affected = builder.build().execute(&mut *tx).await?.rows_affected();
        if affected == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query(&format!("{REQUEST_SELECT} WHERE r.id = ?"))
            .bind(&id.0)
            .fetch_one(&mut *tx)
            .await?;
        let updated = row_to_request(&row)?;
        tx.commit().await?;

        Ok(Some(updated))
    }
}

fn row_to_request(row: &SqliteRow) -> Result<Request, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let product_id: String = row.try_get("product_id").map_err(decode_error)?;
    let title: String = row.try_get("title").map_err(decode_error)?;
    let reason: Option<String> = row.try_get("reason").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;
    let requester_name: Option<String> = row.try_get("requester_name").map_err(decode_error)?;
    let product_name: Option<String> = row.try_get("product_name").map_err(decode_error)?;

    Ok(Request {
        id: RequestId(id),
        requester_id: ActorId(user_id),
        product_id: ProductId(product_id),
        title,
        reason,
        quantity: u32::try_from(quantity)
            .map_err(|_| RepositoryError::Decode(format!("quantity {quantity} out of range")))?,
        status: status.parse().map_err(decode_error)?,
        requester_name,
        product_name,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait]
impl RequestStore for SqlRequestStore {
    async fn select(&self, query: &RequestQuery) -> Result<Vec<Request>, StoreError> {
        Ok(self.select_rows(query).await?)
    }

    async fn insert(
        &self,
        request: ValidatedRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Request, StoreError> {
        Ok(self.insert_row(request, created_at).await?)
    }

    async fn update_where(
        &self,
        id: &RequestId,
        guard: &UpdateGuard,
        patch: &StatusPatch,
    ) -> Result<Option<Request>, StoreError> {
        Ok(self.update_row(id, guard, patch).await?)
    }
}
