use stockroom_core::config::LoadOptions;
use stockroom_db::{migrations, DemoSeedDataset, SeedResult};

use crate::commands::{current_thread_runtime, load_config, open_database, CommandResult, Failure};

pub fn run(options: LoadOptions) -> CommandResult {
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return CommandResult::from_failure("seed", failure),
    };
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return CommandResult::from_failure("seed", failure),
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        let run_result: Result<SeedResult, Failure> = if verification.all_present {
            Ok(seed_result)
        } else {
            Err(("seed_verification", verification_failure_message(&failed_checks), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary_message(&seeded)),
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn summary_message(seeded: &SeedResult) -> String {
    let request_lines: Vec<String> = seeded
        .requests_seeded
        .iter()
        .map(|request| {
            format!("  - {} [{}]: {}", request.request_id, request.status, request.description)
        })
        .collect();

    format!(
        "demo dataset loaded: {} users, {} products, {} movements, {} requests:\n{}",
        seeded.users_seeded,
        seeded.products_seeded,
        seeded.movements_seeded,
        seeded.requests_seeded.len(),
        request_lines.join("\n")
    )
}

fn verification_failure_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let message = verification_failure_message(&["req-demo-002", "movements"]);

        assert_eq!(message, "Seed verification failed for checks: req-demo-002, movements");
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_failure_message(&[]), "Some seed data failed to load");
    }
}
