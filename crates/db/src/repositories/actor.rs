use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use stockroom_core::domain::actor::{Actor, ActorId};

use super::{decode_error, ActorRepository, RepositoryError};
use crate::DbPool;

pub struct SqlActorRepository {
    pool: DbPool,
}

impl SqlActorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_actor(row: &SqliteRow) -> Result<Actor, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    let email: String = row.try_get("email").map_err(decode_error)?;
    let role: String = row.try_get("role").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;

    Ok(Actor {
        id: ActorId(id),
        name,
        email,
        role: role.parse().map_err(decode_error)?,
        status: status.parse().map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl ActorRepository for SqlActorRepository {
    async fn find_by_id(&self, id: &ActorId) -> Result<Option<Actor>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, role, status FROM users WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_actor).transpose()
    }
}

#[cfg(test)]
mod tests {
    use stockroom_core::domain::actor::{ActorId, ActorStatus, Role};

    use super::SqlActorRepository;
    use crate::repositories::test_support::seeded_pool;
    use crate::repositories::ActorRepository;

    #[tokio::test]
    async fn finds_seeded_actor_with_role_and_status() {
        let repo = SqlActorRepository::new(seeded_pool().await);

        let admin = repo.find_by_id(&ActorId("admin".to_string())).await.expect("find");
        let admin = admin.expect("admin exists");
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.is_active());

        let former = repo.find_by_id(&ActorId("u9".to_string())).await.expect("find");
        assert_eq!(former.map(|actor| actor.status), Some(ActorStatus::Inactive));

        assert!(repo.find_by_id(&ActorId("ghost".to_string())).await.expect("find").is_none());
    }
}
