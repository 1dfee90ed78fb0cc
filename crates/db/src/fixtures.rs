use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Expected state of one seeded request.
#[derive(Debug, Clone, Copy)]
struct SeedRequestContract {
    id: &'static str,
    requester_id: &'static str,
    status: &'static str,
    quantity: i64,
    description: &'static str,
}

const SEED_REQUESTS: &[SeedRequestContract] = &[
    SeedRequestContract {
        id: "req-demo-001",
        requester_id: "usr-emp-001",
        status: "pending",
        quantity: 2,
        description: "Pending gloves request from an employee",
    },
    SeedRequestContract {
        id: "req-demo-002",
        requester_id: "usr-emp-002",
        status: "accepted",
        quantity: 40,
        description: "Accepted bolts request with a matching outbound movement",
    },
    SeedRequestContract {
        id: "req-demo-003",
        requester_id: "usr-emp-001",
        status: "rejected",
        quantity: 3,
        description: "Rejected toner request",
    },
    SeedRequestContract {
        id: "req-demo-004",
        requester_id: "usr-emp-002",
        status: "pending",
        quantity: 4,
        description: "Pending goggles request from a second employee",
    },
];

const SEED_USER_IDS: &[&str] = &["usr-admin-001", "usr-emp-001", "usr-emp-002", "usr-emp-003"];

const SEED_PRODUCT_IDS: &[&str] = &["prd-bolt-m8", "prd-gloves-l", "prd-toner-k", "prd-goggles"];

const SEED_MOVEMENT_IDS: &[&str] = &[
    "mov-demo-001",
    "mov-demo-002",
    "mov-demo-003",
    "mov-demo-004",
    "mov-demo-005",
    "mov-demo-006",
];

/// Demo users, catalog, requests and stock log for local runs and smoke tests.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Loads the dataset in one transaction.
    ///
    /// Users and products are upserted. Requests and movements are insert-only, so a reload
    /// never moves a decided request back to pending.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        let requests_seeded = SEED_REQUESTS
            .iter()
            .map(|request| RequestSeedInfo {
                request_id: request.id,
                status: request.status,
                description: request.description,
            })
            .collect();

        Ok(SeedResult {
            users_seeded: SEED_USER_IDS.len(),
            products_seeded: SEED_PRODUCT_IDS.len(),
            movements_seeded: SEED_MOVEMENT_IDS.len(),
            requests_seeded,
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        checks.push(("users", count_ids(pool, "users", SEED_USER_IDS).await? == SEED_USER_IDS.len()));
        checks.push((
            "products",
            count_ids(pool, "products", SEED_PRODUCT_IDS).await? == SEED_PRODUCT_IDS.len(),
        ));
        checks.push((
            "movements",
            count_ids(pool, "movements", SEED_MOVEMENT_IDS).await? == SEED_MOVEMENT_IDS.len(),
        ));

        for request in SEED_REQUESTS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM requests WHERE id = ?1 AND user_id = ?2 AND quantity = ?4
                    AND (status = ?3 OR ?3 = 'pending'))",
            )
            .bind(request.id)
            .bind(request.requester_id)
            .bind(request.status)
            .bind(request.quantity)
            .fetch_one(pool)
            .await?;
            checks.push((request.id, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes seeded rows, children first. Test-only: production data never loses requests.
    #[cfg(test)]
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let request_ids: Vec<&str> = SEED_REQUESTS.iter().map(|request| request.id).collect();
        let mut tx = pool.begin().await?;

        for (table, ids) in [
            ("movements", SEED_MOVEMENT_IDS),
            ("requests", request_ids.as_slice()),
            ("products", SEED_PRODUCT_IDS),
            ("users", SEED_USER_IDS),
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE id IN {}", sql_array_from_ids(ids)))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn count_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<usize, RepositoryError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(1) FROM {table} WHERE id IN {}",
        sql_array_from_ids(ids)
    ))
    .fetch_one(pool)
    .await?;
    usize::try_from(count).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub users_seeded: usize,
    pub products_seeded: usize,
    pub movements_seeded: usize,
    pub requests_seeded: Vec<RequestSeedInfo>,
}

#[derive(Debug)]
pub struct RequestSeedInfo {
    pub request_id: &'static str,
    pub status: &'static str,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
