use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use stockroom_core::domain::product::{Product, ProductId};

use super::{decode_error, decode_timestamp, ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_SELECT: &str = "SELECT id, name, category, price, stock, min_stock, description,
        created_at, updated_at
     FROM products";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_error)?;
    let name: String = row.try_get("name").map_err(decode_error)?;
    let category: String = row.try_get("category").map_err(decode_error)?;
    let price: String = row.try_get("price").map_err(decode_error)?;
    let stock: i64 = row.try_get("stock").map_err(decode_error)?;
    let min_stock: i64 = row.try_get("min_stock").map_err(decode_error)?;
    let description: Option<String> = row.try_get("description").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    Ok(Product {
        id: ProductId(id),
        name,
        category,
        price: Decimal::from_str(&price)
            .map_err(|error| RepositoryError::Decode(format!("price `{price}`: {error}")))?,
        stock,
        min_stock,
        description,
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("{PRODUCT_SELECT} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(&format!("{PRODUCT_SELECT} ORDER BY created_at DESC, id ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_product).collect()
    }
}
