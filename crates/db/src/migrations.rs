use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Number of known up-migrations not yet applied. A database never migrated reports all of them.
pub async fn pending_count(pool: &DbPool) -> Result<usize, sqlx::Error> {
    let applied: Vec<i64> =
        match sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await
        {
            Ok(applied) => applied,
            Err(sqlx::Error::Database(error)) if error.message().contains("no such table") => {
                Vec::new()
            }
            Err(error) => return Err(error),
        };

    Ok(MIGRATOR
        .iter()
        .filter(|migration| !migration.migration_type.is_down_migration())
        .filter(|migration| !applied.contains(&migration.version))
        .count())
}

#[cfg(test)]
mod tests {
    use super::{pending_count, run_pending};
    use crate::{connect_with_settings, migrations::MIGRATOR};

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "users",
        "products",
        "requests",
        "movements",
        "idx_requests_user_id",
        "idx_requests_status",
        "idx_requests_created_at",
        "idx_movements_product_id",
        "idx_movements_created_at",
    ];

    async fn table_exists(pool: &sqlx::SqlitePool, name: &str) -> bool {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("query sqlite_master");
        count == 1
    }

    #[tokio::test]
    async fn migrations_create_baseline_tables() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for table in ["users", "products", "requests", "movements"] {
            assert!(table_exists(&pool, table).await, "missing table `{table}`");
        }
    }

    #[tokio::test]
    async fn pending_count_drops_to_zero_after_migrating() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");

        assert_eq!(pending_count(&pool).await.expect("count before"), 1);
        run_pending(&pool).await.expect("run migrations");
        assert_eq!(pending_count(&pool).await.expect("count after"), 0);
    }

    #[tokio::test]
    async fn requests_reject_non_positive_quantity() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");
        sqlx::query(
            "INSERT INTO users (id, name, email, role, status, created_at)
             VALUES ('u1', 'Ana', 'ana@stockroom.test', 'employee', 'active', '2025-01-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await
        .expect("insert user");
        sqlx::query(
            "INSERT INTO products (id, name, category, price, stock, min_stock, created_at, updated_at)
             VALUES ('p1', 'Bolt', 'hardware', '0.25', 10, 2, '2025-01-01T00:00:00.000000Z', '2025-01-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await
        .expect("insert product");

        let outcome = sqlx::query(
            "INSERT INTO requests (id, user_id, product_id, title, status, quantity, created_at, updated_at)
             VALUES ('r1', 'u1', 'p1', 'zero', 'pending', 0, '2025-01-01T00:00:00.000000Z', '2025-01-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await;

        assert!(outcome.is_err(), "quantity check constraint should reject zero");
    }

    #[tokio::test]
    async fn migrations_up_down_up_preserves_schema_signature() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let initial_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            initial_signature.len(),
            MANAGED_SCHEMA_OBJECTS.len(),
            "initial migration pass should create all managed schema objects",
        );

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        let after_down_signature = managed_schema_signature(&pool).await;
        assert!(
            after_down_signature.is_empty(),
            "managed schema objects should be removed after full undo",
        );

        run_pending(&pool).await.expect("re-run migrations");

        let after_second_up_signature = managed_schema_signature(&pool).await;
        assert_eq!(
            after_second_up_signature, initial_signature,
            "up/down/up should preserve migration-managed schema signature",
        );
    }

    async fn managed_schema_signature(pool: &sqlx::SqlitePool) -> Vec<(String, String, String)> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT type, name, IFNULL(sql, '') AS sql
             FROM sqlite_master
             WHERE type IN ('table', 'index')",
        )
        .fetch_all(pool)
        .await
        .expect("load schema objects");

        let mut signature: Vec<(String, String, String)> = rows
            .into_iter()
            .filter(|(_, name, _)| MANAGED_SCHEMA_OBJECTS.contains(&name.as_str()))
            .collect();
        signature.sort();
        signature
    }
}
