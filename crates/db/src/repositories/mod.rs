use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use stockroom_core::domain::actor::{Actor, ActorId};
use stockroom_core::domain::movement::Movement;
use stockroom_core::domain::product::{Product, ProductId};
use stockroom_core::reporting::ReportFilter;
use stockroom_core::store::StoreError;

pub mod actor;
pub mod memory;
pub mod movement;
pub mod product;
pub mod request;

pub use actor::SqlActorRepository;
pub use memory::InMemoryRequestStore;
pub use movement::SqlMovementRepository;
pub use product::SqlProductRepository;
pub use request::SqlRequestStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(error) => StoreError::Backend(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}

#[async_trait]
pub trait ActorRepository: Send + Sync {
    async fn find_by_id(&self, id: &ActorId) -> Result<Option<Actor>, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;
}

#[async_trait]
pub trait MovementRepository: Send + Sync {
    /// Movements matching the date, actor, product and kind parts of `filter`, newest first.
    /// Free-text matching is left to the report builder.
    async fn list(&self, filter: &ReportFilter) -> Result<Vec<Movement>, RepositoryError>;

    /// Appends `movement` and applies its quantity to the product's stock in one transaction.
    ///
    /// Returns the new stock level, or `Ok(None)` when the product is missing or the change
    /// would take stock below zero. Nothing is written in that case.
    async fn record(&self, movement: &Movement) -> Result<Option<i64>, RepositoryError>;
}

/// Timestamps are stored as fixed-width UTC RFC 3339 text so string order is time order.
pub(crate) fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}
