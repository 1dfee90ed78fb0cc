use std::env;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use chrono::NaiveDate;
use serde_json::Value;
use stockroom_cli::commands::movements::RecordMovement;
use stockroom_cli::commands::requests::RequestAction;
use stockroom_cli::commands::{doctor, migrate, movements, report, requests, seed};
use stockroom_core::config::LoadOptions;
use stockroom_core::domain::actor::ActorId;
use stockroom_core::domain::movement::MovementKind;
use stockroom_core::domain::product::ProductId;
use stockroom_core::domain::request::{RequestId, RequestStatus};
use stockroom_core::reporting::ReportFilter;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("STOCKROOM_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("STOCKROOM_DATABASE_URL", "postgres://localhost/stock")], || {
        let result = migrate::run(LoadOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_seeded_database(|_| {
        let second = seed::run(LoadOptions::default());
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        let payload = parse_payload(&second.output);
        assert_eq!(payload["command"], "seed");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("4 users, 4 products, 6 movements, 4 requests"));
        assert!(message.contains("  - req-demo-001 [pending]: Pending gloves request from an employee"));
    });
}

#[test]
fn doctor_reports_schema_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = database_url(&dir.path().join("doctor.db"));

    with_env(&[("STOCKROOM_DATABASE_URL", url.as_str())], || {
        let before: Value =
            serde_json::from_str(&doctor::run(LoadOptions::default(), true)).expect("json");
        assert_eq!(before["overall_status"], "fail");
        assert_eq!(before["checks"][1]["name"], "database_connectivity");
        assert_eq!(before["checks"][1]["status"], "pass");
        assert_eq!(before["checks"][2]["status"], "fail");

        assert_eq!(migrate::run(LoadOptions::default()).exit_code, 0);

        let after: Value =
            serde_json::from_str(&doctor::run(LoadOptions::default(), true)).expect("json");
        assert_eq!(after["overall_status"], "pass");
    });
}

#[test]
fn admin_lists_every_request_and_employee_only_their_own() {
    with_seeded_database(|_| {
        let admin = requests::run(LoadOptions::default(), actor("usr-admin-001"), list_all());
        let employee = requests::run(LoadOptions::default(), actor("usr-emp-001"), list_all());

        let admin_payload = parse_payload(&admin.output);
        let employee_payload = parse_payload(&employee.output);
        assert_eq!(admin_payload["command"], "requests.list");
        assert_eq!(admin_payload["data"].as_array().map(Vec::len), Some(4));
        assert_eq!(employee_payload["data"].as_array().map(Vec::len), Some(2));
    });
}

#[test]
fn approving_twice_reports_a_conflict() {
    with_seeded_database(|_| {
        let first = requests::run(
            LoadOptions::default(),
            actor("usr-admin-001"),
            RequestAction::Approve { id: RequestId("req-demo-001".to_string()) },
        );
        assert_eq!(first.exit_code, 0, "{}", first.output);
        assert_eq!(parse_payload(&first.output)["data"]["status"], "accepted");

        let second = requests::run(
            LoadOptions::default(),
            actor("usr-admin-001"),
            RequestAction::Approve { id: RequestId("req-demo-001".to_string()) },
        );
        assert_eq!(second.exit_code, 6);
        let payload = parse_payload(&second.output);
        assert_eq!(payload["error_class"], "conflict");
        assert!(payload["message"].as_str().unwrap_or_default().contains("Refresh"));
    });
}

#[test]
fn employees_cannot_decide_requests() {
    with_seeded_database(|_| {
        let result = requests::run(
            LoadOptions::default(),
            actor("usr-emp-002"),
            RequestAction::Reject { id: RequestId("req-demo-004".to_string()) },
        );

        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "unauthorized");
    });
}

#[test]
fn employee_creates_then_cancels_a_request() {
    with_seeded_database(|_| {
        let created = requests::run(
            LoadOptions::default(),
            actor("usr-emp-001"),
            RequestAction::Create {
                product: ProductId("prd-bolt-m8".to_string()),
                title: "Need bolts".to_string(),
                reason: Some("restock".to_string()),
                quantity: 5,
            },
        );
        assert_eq!(created.exit_code, 0, "{}", created.output);
        let created_payload = parse_payload(&created.output);
        assert_eq!(created_payload["data"]["status"], "pending");
        assert_eq!(created_payload["data"]["quantity"], 5);
        let id = created_payload["data"]["id"].as_str().expect("id").to_string();

        let cancelled = requests::run(
            LoadOptions::default(),
            actor("usr-emp-001"),
            RequestAction::Cancel { id: RequestId(id) },
        );
        assert_eq!(cancelled.exit_code, 0, "{}", cancelled.output);
        let cancelled_payload = parse_payload(&cancelled.output);
        assert_eq!(cancelled_payload["data"]["status"], "rejected");
        assert_eq!(cancelled_payload["data"]["reason"], "cancelled by requester");
    });
}

#[test]
fn employees_cannot_cancel_a_colleagues_request() {
    with_seeded_database(|_| {
        let result = requests::run(
            LoadOptions::default(),
            actor("usr-emp-001"),
            RequestAction::Cancel { id: RequestId("req-demo-004".to_string()) },
        );

        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "unauthorized");

        let admin = requests::run(
            LoadOptions::default(),
            actor("usr-admin-001"),
            RequestAction::List {
                status: Some(RequestStatus::Pending),
                requester: Some(ActorId("usr-emp-002".to_string())),
                q: None,
            },
        );
        let pending = parse_payload(&admin.output);
        assert_eq!(pending["data"][0]["id"], "req-demo-004");
    });
}

#[test]
fn zero_quantity_is_a_validation_failure() {
    with_seeded_database(|_| {
        let result = requests::run(
            LoadOptions::default(),
            actor("usr-emp-001"),
            RequestAction::Create {
                product: ProductId("prd-bolt-m8".to_string()),
                title: "Need bolts".to_string(),
                reason: None,
                quantity: 0,
            },
        );

        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "validation");
    });
}

#[test]
fn unknown_and_inactive_actors_are_refused() {
    with_seeded_database(|_| {
        let unknown = requests::run(LoadOptions::default(), actor("usr-nobody"), list_all());
        assert_eq!(unknown.exit_code, 6);
        assert_eq!(parse_payload(&unknown.output)["error_class"], "unknown_actor");

        let inactive = requests::run(LoadOptions::default(), actor("usr-emp-003"), list_all());
        assert_eq!(inactive.exit_code, 6);
        assert_eq!(parse_payload(&inactive.output)["error_class"], "unauthorized");
    });
}

#[test]
fn employee_usage_draws_down_stock() {
    with_seeded_database(|_| {
        let result = movements::record(
            LoadOptions::default(),
            actor("usr-emp-001"),
            gloves(MovementKind::Usage, 2),
        );
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "movements.record");
        assert_eq!(payload["data"]["movement"]["quantity"], -2);
        assert_eq!(payload["data"]["stock"], 1);
        assert_eq!(payload["data"]["low_stock"], true);

        let overdraw = movements::record(
            LoadOptions::default(),
            actor("usr-emp-001"),
            gloves(MovementKind::Usage, 2),
        );
        assert_eq!(overdraw.exit_code, 6);
        assert_eq!(parse_payload(&overdraw.output)["error_class"], "insufficient_stock");
    });
}

#[test]
fn receiving_stock_is_reserved_for_administrators() {
    with_seeded_database(|_| {
        let employee = movements::record(
            LoadOptions::default(),
            actor("usr-emp-001"),
            gloves(MovementKind::Inbound, 50),
        );
        assert_eq!(employee.exit_code, 6);
        assert_eq!(parse_payload(&employee.output)["error_class"], "unauthorized");

        let admin = movements::record(
            LoadOptions::default(),
            actor("usr-admin-001"),
            gloves(MovementKind::Inbound, 50),
        );
        assert_eq!(admin.exit_code, 0, "{}", admin.output);
        assert_eq!(parse_payload(&admin.output)["data"]["stock"], 53);
    });
}

#[test]
fn movements_for_unknown_products_are_refused() {
    with_seeded_database(|_| {
        let result = movements::record(
            LoadOptions::default(),
            actor("usr-admin-001"),
            RecordMovement {
                product: ProductId("prd-missing".to_string()),
                kind: MovementKind::Adjustment,
                quantity: -1,
                reason: None,
            },
        );

        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "unknown_product");
    });
}

#[test]
fn march_report_aggregates_seeded_data() {
    with_seeded_database(|_| {
        let filter = ReportFilter {
            date_from: NaiveDate::from_ymd_opt(2025, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 3, 31),
            ..ReportFilter::default()
        };
        let result = report::run(LoadOptions::default(), filter);
        assert_eq!(result.exit_code, 0, "{}", result.output);

        let payload = parse_payload(&result.output);
        let data = &payload["data"];
        assert_eq!(data["report"]["totals"]["movements"], 3);
        assert_eq!(data["report"]["totals"]["requests"], 4);
        assert_eq!(data["report"]["by_status"]["pending"], 2);
        assert_eq!(data["report"]["monthly"][2]["outgoing"], 40);
        assert_eq!(data["inventory"]["products"], 4);
        assert_eq!(data["inventory"]["low_stock"], 1);
    });
}

#[test]
fn report_rejects_inverted_date_range() {
    with_env(&[], || {
        let filter = ReportFilter {
            date_from: NaiveDate::from_ymd_opt(2025, 4, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 3, 1),
            ..ReportFilter::default()
        };
        let result = report::run(LoadOptions::default(), filter);

        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_filter");
    });
}

fn actor(id: &str) -> ActorId {
    ActorId(id.to_string())
}

fn gloves(kind: MovementKind, quantity: i64) -> RecordMovement {
    RecordMovement {
        product: ProductId("prd-gloves-l".to_string()),
        kind,
        quantity,
        reason: Some("paint line".to_string()),
    }
}

fn list_all() -> RequestAction {
    RequestAction::List { status: None::<RequestStatus>, requester: None, q: None }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn database_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

/// Runs `test_fn` against a freshly seeded file database.
fn with_seeded_database(test_fn: impl FnOnce(&Path)) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("stockroom.db");
    let url = database_url(&path);

    with_env(&[("STOCKROOM_DATABASE_URL", url.as_str())], || {
        let seeded = seed::run(LoadOptions::default());
        assert_eq!(seeded.exit_code, 0, "seed failed: {}", seeded.output);
        test_fn(&path);
    });
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "STOCKROOM_DATABASE_URL",
        "STOCKROOM_DATABASE_MAX_CONNECTIONS",
        "STOCKROOM_DATABASE_TIMEOUT_SECS",
        "STOCKROOM_LOGGING_LEVEL",
        "STOCKROOM_LOGGING_FORMAT",
        "STOCKROOM_LOG_LEVEL",
        "STOCKROOM_LOG_FORMAT",
        "STOCKROOM_REQUESTS_CANCELLATION_REASON",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
