pub mod config;
pub mod doctor;
pub mod migrate;
pub mod movements;
pub mod report;
pub mod requests;
pub mod seed;

use serde::Serialize;
use stockroom_core::config::{AppConfig, LoadOptions};
use stockroom_core::domain::actor::ActorId;
use stockroom_core::session::Session;
use stockroom_db::{connect_with_settings, ActorRepository, DbPool, SqlActorRepository};
use tokio::runtime::Runtime;

/// Error class, message and exit code of a failed command step.
pub(crate) type Failure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<D: Serialize> {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<D>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data::<()>(command, message, None)
    }

    pub fn success_with_data<D: Serialize>(
        command: &str,
        message: impl Into<String>,
        data: Option<D>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome::<()> {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub(crate) fn from_failure(command: &str, (error_class, message, exit_code): Failure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload<D: Serialize>(payload: CommandOutcome<D>) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(options: LoadOptions) -> Result<AppConfig, Failure> {
    AppConfig::load(options)
        .map_err(|error| ("config_validation", format!("configuration issue: {error}"), 2))
}

pub(crate) fn current_thread_runtime() -> Result<Runtime, Failure> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| ("runtime_init", format!("failed to initialize async runtime: {error}"), 3))
}

pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, Failure> {
    connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4))
}

/// Looks the actor up and opens a session for them; inactive actors are refused.
pub(crate) async fn open_session(pool: &DbPool, actor_id: &ActorId) -> Result<Session, Failure> {
    let actor = SqlActorRepository::new(pool.clone())
        .find_by_id(actor_id)
        .await
        .map_err(|error| ("db_execution", error.to_string(), 5u8))?
        .ok_or_else(|| ("unknown_actor", format!("no actor with id `{actor_id}`"), 6u8))?;

    Session::new(actor).map_err(|error| ("unauthorized", error.to_string(), 6u8))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::CommandResult;

    #[test]
    fn failure_payload_carries_class_and_code() {
        let result = CommandResult::failure("seed", "seed_verification", "missing rows", 6);
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 6);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "seed_verification");
        assert!(payload.get("data").is_none());
    }

    #[test]
    fn success_payload_includes_data_when_present() {
        let result =
            CommandResult::success_with_data("requests", "1 request", Some(vec!["req-1"]));
        let payload: Value = serde_json::from_str(&result.output).expect("json");

        assert_eq!(result.exit_code, 0);
        assert_eq!(payload["error_class"], Value::Null);
        assert_eq!(payload["data"][0], "req-1");
    }
}
