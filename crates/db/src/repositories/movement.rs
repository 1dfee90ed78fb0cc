use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use stockroom_core::domain::actor::ActorId;
use stockroom_core::domain::movement::{Movement, MovementId};
use stockroom_core::domain::product::ProductId;
use stockroom_core::reporting::ReportFilter;

use super::{decode_error, decode_timestamp, encode_timestamp, MovementRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMovementRepository {
    pool: DbPool,
}

impl SqlMovementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_movement(row: &SqliteRow) -> Result<Movement, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let kind: String = row.try_get("kind").map_err(decode_error)?;
    let product_id: String = row.try_get("product_id").map_err(decode_error)?;
    let user_id: String = row.try_get("user_id").map_err(decode_error)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode_error)?;
    let reason: String = row.try_get("reason").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let actor_name: Option<String> = row.try_get("actor_name").map_err(decode_error)?;
    let product_name: Option<String> = row.try_get("product_name").map_err(decode_error)?;

    Ok(Movement {
        id: MovementId(id),
        kind: kind.parse().map_err(decode_error)?,
        product_id: ProductId(product_id),
        actor_id: ActorId(user_id),
        quantity,
        reason,
        status: status.parse().map_err(decode_error)?,
        actor_name,
        product_name,
        created_at: decode_timestamp("created_at", &created_at)?,
    })
}

#[async_trait::async_trait]
impl MovementRepository for SqlMovementRepository {
    async fn list(&self, filter: &ReportFilter) -> Result<Vec<Movement>, RepositoryError> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT m.id, m.kind, m.product_id, m.user_id, m.quantity, m.reason, m.status,
                    m.created_at, u.name AS actor_name, p.name AS product_name
             FROM movements m
             LEFT JOIN users u ON u.id = m.user_id
             LEFT JOIN products p ON p.id = m.product_id
             WHERE 1=1",
        );

        if let Some(actor_id) = &filter.actor_id {
            builder.push(" AND m.user_id = ");
            builder.push_bind(actor_id.0.clone());
        }
        if let Some(product_id) = &filter.product_id {
            builder.push(" AND m.product_id = ");
            builder.push_bind(product_id.0.clone());
        }
        if let Some(kind) = filter.movement_kind {
            builder.push(" AND m.kind = ");
            builder.push_bind(kind.as_str());
        }
        if let Some(from) = filter.starts_at() {
            builder.push(" AND m.created_at >= ");
            builder.push_bind(encode_timestamp(from));
        }
        if let Some(to) = filter.ends_at() {
            builder.push(" AND m.created_at <= ");
            builder.push_bind(encode_timestamp(to));
        }

        builder.push(" ORDER BY m.created_at DESC, m.id DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_movement).collect()
    }

    async fn record(&self, movement: &Movement) -> Result<Option<i64>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let stock: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET stock = stock + ?1, updated_at = ?2
             WHERE id = ?3 AND stock + ?1 >= 0
             RETURNING stock",
        )
        .bind(movement.quantity)
        .bind(encode_timestamp(movement.created_at))
        .bind(&movement.product_id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(stock) = stock else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "INSERT INTO movements (id, kind, product_id, user_id, quantity, reason, status,
                                    created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&movement.id.0)
        .bind(movement.kind.as_str())
        .bind(&movement.product_id.0)
        .bind(&movement.actor_id.0)
        .bind(movement.quantity)
        .bind(&movement.reason)
        .bind(movement.status.as_str())
        .bind(encode_timestamp(movement.created_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(stock))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use stockroom_core::domain::actor::ActorId;
    use stockroom_core::domain::movement::{Movement, MovementId, MovementKind, MovementStatus};
    use stockroom_core::domain::product::ProductId;
    use stockroom_core::reporting::{build_report, ReportFilter};

    use super::SqlMovementRepository;
    use crate::repositories::test_support::{at, seeded_pool};
    use crate::repositories::{MovementRepository, ProductRepository, SqlProductRepository};

    fn movement(id: &str, kind: MovementKind, quantity: i64, actor: &str, day: u32) -> Movement {
        Movement {
            id: MovementId(id.to_string()),
            kind,
            product_id: ProductId("p1".to_string()),
            actor_id: ActorId(actor.to_string()),
            quantity,
            reason: String::new(),
            status: MovementStatus::Completed,
            actor_name: None,
            product_name: None,
            created_at: at(day, 23),
        }
    }

    async fn repo_with_log() -> SqlMovementRepository {
        let repo = SqlMovementRepository::new(seeded_pool().await);
        for entry in [
            movement("m1", MovementKind::Inbound, 100, "admin", 1),
            movement("m2", MovementKind::Outbound, -20, "u1", 2),
            movement("m3", MovementKind::Usage, -5, "u2", 3),
            movement("m4", MovementKind::Return, 2, "u2", 4),
        ] {
            repo.record(&entry).await.expect("record movement").expect("stock available");
        }
        repo
    }

    #[tokio::test]
    async fn list_pushes_down_kind_and_inclusive_date_range() {
        let repo = repo_with_log().await;

        let window = ReportFilter {
            date_from: NaiveDate::from_ymd_opt(2025, 3, 2),
            date_to: NaiveDate::from_ymd_opt(2025, 3, 3),
            ..ReportFilter::default()
        };
        let rows = repo.list(&window).await.expect("list window");
        let ids: Vec<&str> = rows.iter().map(|row| row.id.0.as_str()).collect();
        assert_eq!(ids, vec!["m3", "m2"]);
        assert_eq!(rows[0].actor_name.as_deref(), Some("Luis Vega"));

        let returns = ReportFilter {
            movement_kind: Some(MovementKind::Return),
            ..ReportFilter::default()
        };
        assert_eq!(repo.list(&returns).await.expect("list returns").len(), 1);
    }

    #[tokio::test]
    async fn stored_log_feeds_the_report() {
        let repo = repo_with_log().await;
        let filter = ReportFilter::default();

        let movements = repo.list(&filter).await.expect("list");
        let report = build_report(&filter, &movements, &[]);

        let march = &report.monthly[2];
        assert_eq!(march.incoming, 102);
        assert_eq!(march.outgoing, 25);
        assert_eq!(report.by_actor.get("Luis Vega"), Some(&2));
    }

    #[tokio::test]
    async fn record_moves_stock_with_the_log() {
        let pool = seeded_pool().await;
        let repo = SqlMovementRepository::new(pool.clone());

        let stock = repo
            .record(&movement("m1", MovementKind::Outbound, -150, "u1", 5))
            .await
            .expect("record");
        assert_eq!(stock, Some(250));

        let bolts = SqlProductRepository::new(pool)
            .find_by_id(&ProductId("p1".to_string()))
            .await
            .expect("find")
            .expect("bolts exist");
        assert_eq!(bolts.stock, 250);
        assert_eq!(repo.list(&ReportFilter::default()).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn record_refuses_to_take_stock_below_zero() {
        let repo = SqlMovementRepository::new(seeded_pool().await);

        let overdraw = repo
            .record(&movement("m1", MovementKind::Usage, -401, "u1", 5))
            .await
            .expect("record");
        let mut unknown = movement("m2", MovementKind::Inbound, 5, "u1", 5);
        unknown.product_id = ProductId("ghost".to_string());
        let missing = repo.record(&unknown).await.expect("record");

        assert_eq!(overdraw, None);
        assert_eq!(missing, None);
        assert!(repo.list(&ReportFilter::default()).await.expect("list").is_empty());
    }
}
