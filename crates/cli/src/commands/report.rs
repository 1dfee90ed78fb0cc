use serde::Serialize;
use stockroom_core::config::LoadOptions;
use stockroom_core::reporting::{build_report, InventorySummary, ReportData, ReportFilter};
use stockroom_core::store::RequestStore;
use stockroom_db::{
    MovementRepository, ProductRepository, SqlMovementRepository, SqlProductRepository,
    SqlRequestStore,
};

use crate::commands::{current_thread_runtime, load_config, open_database, CommandResult, Failure};

#[derive(Debug, Serialize)]
struct ReportOutput {
    filter: ReportFilter,
    report: ReportData,
    inventory: InventorySummary,
}

pub fn run(options: LoadOptions, filter: ReportFilter) -> CommandResult {
    if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
        if from > to {
            return CommandResult::failure(
                "report",
                "invalid_filter",
                format!("--from {from} is after --to {to}"),
                6,
            );
        }
    }

    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return CommandResult::from_failure("report", failure),
    };
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return CommandResult::from_failure("report", failure),
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        let fetched = async {
            let movements = SqlMovementRepository::new(pool.clone()).list(&filter).await?;
            let requests =
                SqlRequestStore::new(pool.clone()).select(&filter.request_query()).await?;
            let products = SqlProductRepository::new(pool.clone()).list().await?;
            Ok::<_, anyhow::Error>((movements, requests, products))
        }
        .await;
        pool.close().await;

        let (movements, requests, products) =
            fetched.map_err(|error| ("db_execution", error.to_string(), 5u8))?;
        Ok::<_, Failure>(ReportOutput {
            report: build_report(&filter, &movements, &requests),
            inventory: InventorySummary::from_products(&products),
            filter: filter.clone(),
        })
    });

    match result {
        Ok(output) => {
            tracing::info!(
                event_name = "cli.report.built",
                correlation_id = "cli",
                movements = output.report.totals.movements,
                requests = output.report.totals.requests,
                "report built"
            );
            let message = format!(
                "{} movement(s), {} request(s), {} product(s)",
                output.report.totals.movements,
                output.report.totals.requests,
                output.inventory.products
            );
            CommandResult::success_with_data("report", message, Some(output))
        }
        Err(failure) => CommandResult::from_failure("report", failure),
    }
}
