use chrono::Utc;
use serde::Serialize;
use stockroom_core::config::LoadOptions;
use stockroom_core::domain::actor::ActorId;
use stockroom_core::domain::movement::{Movement, MovementKind, NewMovement};
use stockroom_core::domain::product::ProductId;
use stockroom_core::policy;
use stockroom_db::{
    DbPool, MovementRepository, ProductRepository, SqlMovementRepository, SqlProductRepository,
};

use crate::commands::{
    current_thread_runtime, load_config, open_database, open_session, CommandResult, Failure,
};

const COMMAND: &str = "movements.record";

#[derive(Clone, Debug)]
pub struct RecordMovement {
    pub product: ProductId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecordedMovement {
    movement: Movement,
    stock: i64,
    low_stock: bool,
}

/// Logs a stock movement and moves the product's stock with it.
pub fn record(options: LoadOptions, actor_id: ActorId, input: RecordMovement) -> CommandResult {
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return CommandResult::from_failure(COMMAND, failure),
    };
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return CommandResult::from_failure(COMMAND, failure),
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let outcome = execute(&pool, actor_id, input).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(recorded) => {
            tracing::info!(
                event_name = "cli.movements.recorded",
                correlation_id = "cli",
                movement_id = %recorded.movement.id,
                product_id = %recorded.movement.product_id,
                kind = %recorded.movement.kind,
                quantity = recorded.movement.quantity,
                stock = recorded.stock,
                "movement recorded"
            );
            let message = format!(
                "{} of {} recorded for `{}`; stock is now {}",
                recorded.movement.kind,
                recorded.movement.quantity,
                recorded.movement.product_id,
                recorded.stock
            );
            CommandResult::success_with_data(COMMAND, message, Some(recorded))
        }
        Err(failure) => CommandResult::from_failure(COMMAND, failure),
    }
}

async fn execute(
    pool: &DbPool,
    actor_id: ActorId,
    input: RecordMovement,
) -> Result<RecordedMovement, Failure> {
    let session = open_session(pool, &actor_id).await?;
    policy::can_record_movement(session.actor(), input.kind)
        .map_err(|denial| ("unauthorized", denial.reason(), 6u8))?;

    let movement = NewMovement {
        product_id: input.product,
        actor_id,
        kind: input.kind,
        quantity: input.quantity,
        reason: input.reason,
    }
    .into_movement(Utc::now())
    .map_err(|error| ("validation", error.to_string(), 6u8))?;

    let product = SqlProductRepository::new(pool.clone())
        .find_by_id(&movement.product_id)
        .await
        .map_err(|error| ("db_execution", error.to_string(), 5u8))?
        .ok_or_else(|| {
            ("unknown_product", format!("no product with id `{}`", movement.product_id), 6u8)
        })?;
    product
        .stock_after(movement.quantity)
        .map_err(|error| ("insufficient_stock", error.to_string(), 6u8))?;

    let stock = SqlMovementRepository::new(pool.clone())
        .record(&movement)
        .await
        .map_err(|error| ("db_execution", error.to_string(), 5u8))?
        .ok_or_else(|| {
            (
                "insufficient_stock",
                format!("stock of `{}` changed concurrently; retry", movement.product_id),
                6u8,
            )
        })?;

    Ok(RecordedMovement { low_stock: stock <= product.min_stock, movement, stock })
}
