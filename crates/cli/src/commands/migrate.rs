use stockroom_core::config::LoadOptions;
use stockroom_db::migrations;

use crate::commands::{current_thread_runtime, load_config, open_database, CommandResult, Failure};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return CommandResult::from_failure("migrate", failure),
    };
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return CommandResult::from_failure("migrate", failure),
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let pending = migrations::pending_count(&pool)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<usize, Failure>(pending)
    });

    match result {
        Ok(0) => CommandResult::success("migrate", "schema already up to date"),
        Ok(applied) => {
            tracing::info!(
                event_name = "cli.migrate.applied",
                correlation_id = "cli",
                applied,
                "applied pending migrations"
            );
            CommandResult::success("migrate", format!("applied {applied} pending migration(s)"))
        }
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}
