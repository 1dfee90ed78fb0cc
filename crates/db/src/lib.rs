pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, RequestSeedInfo, SeedResult, VerificationResult};
pub use repositories::{
    ActorRepository, InMemoryRequestStore, MovementRepository, ProductRepository,
    RepositoryError, SqlActorRepository, SqlMovementRepository, SqlProductRepository,
    SqlRequestStore,
};
