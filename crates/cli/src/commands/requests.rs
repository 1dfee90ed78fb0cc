use std::sync::Arc;

use stockroom_core::config::{AppConfig, LoadOptions};
use stockroom_core::domain::actor::ActorId;
use stockroom_core::domain::product::ProductId;
use stockroom_core::domain::request::{NewRequest, Request, RequestId, RequestStatus};
use stockroom_core::errors::{InterfaceError, LifecycleError};
use stockroom_core::lifecycle::{LoadFilter, RequestLifecycleManager};
use stockroom_db::{DbPool, SqlRequestStore};

use crate::commands::{
    current_thread_runtime, load_config, open_database, open_session, CommandResult, Failure,
};

/// One `requests` subcommand, already parsed.
#[derive(Clone, Debug)]
pub enum RequestAction {
    List { status: Option<RequestStatus>, requester: Option<ActorId>, q: Option<String> },
    Create { product: ProductId, title: String, reason: Option<String>, quantity: i64 },
    Approve { id: RequestId },
    Reject { id: RequestId },
    Cancel { id: RequestId },
}

impl RequestAction {
    fn command(&self) -> &'static str {
        match self {
            Self::List { .. } => "requests.list",
            Self::Create { .. } => "requests.create",
            Self::Approve { .. } => "requests.approve",
            Self::Reject { .. } => "requests.reject",
            Self::Cancel { .. } => "requests.cancel",
        }
    }
}

enum Outcome {
    Listed(Vec<Request>),
    Changed(Request),
}

pub fn run(options: LoadOptions, actor_id: ActorId, action: RequestAction) -> CommandResult {
    let command = action.command();
    let config = match load_config(options) {
        Ok(config) => config,
        Err(failure) => return CommandResult::from_failure(command, failure),
    };
    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(failure) => return CommandResult::from_failure(command, failure),
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let outcome = execute(&pool, &config, actor_id, action).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(Outcome::Listed(requests)) => {
            let message = format!("{} request(s) visible", requests.len());
            CommandResult::success_with_data(command, message, Some(requests))
        }
        Ok(Outcome::Changed(request)) => {
            let message = format!("request `{}` is {}", request.id, request.status);
            CommandResult::success_with_data(command, message, Some(request))
        }
        Err(failure) => CommandResult::from_failure(command, failure),
    }
}

async fn execute(
    pool: &DbPool,
    config: &AppConfig,
    actor_id: ActorId,
    action: RequestAction,
) -> Result<Outcome, Failure> {
    let manager = open_manager(pool, config, &actor_id).await?;

    // Transitions act on the cached view, so it is filled first.
    if !matches!(action, RequestAction::List { .. }) {
        manager
            .load(LoadFilter::default())
            .await
            .map_err(|error| lifecycle_failure(&manager, error))?;
    }

    let outcome = match action {
        RequestAction::List { status, requester, q } => manager
            .load(LoadFilter { requester_id: requester, status, product_id: None, q })
            .await
            .map(Outcome::Listed),
        RequestAction::Create { product, title, reason, quantity } => manager
            .create(NewRequest {
                requester_id: actor_id,
                product_id: product,
                title,
                reason,
                quantity,
            })
            .await
            .map(Outcome::Changed),
        RequestAction::Approve { id } => manager.approve(&id).await.map(Outcome::Changed),
        RequestAction::Reject { id } => manager.reject(&id).await.map(Outcome::Changed),
        RequestAction::Cancel { id } => manager.cancel(&id, &actor_id).await.map(Outcome::Changed),
    };

    outcome.map_err(|error| lifecycle_failure(&manager, error))
}

async fn open_manager(
    pool: &DbPool,
    config: &AppConfig,
    actor_id: &ActorId,
) -> Result<RequestLifecycleManager<SqlRequestStore>, Failure> {
    let session = open_session(pool, actor_id).await?;

    Ok(RequestLifecycleManager::new(Arc::new(SqlRequestStore::new(pool.clone())), session)
        .with_cancellation_reason(config.requests.cancellation_reason.clone()))
}

fn lifecycle_failure(
    manager: &RequestLifecycleManager<SqlRequestStore>,
    error: LifecycleError,
) -> Failure {
    let detail = error.to_string();
    let interface = error.into_interface(manager.session().correlation_id());
    let (error_class, exit_code) = match &interface {
        InterfaceError::BadRequest { .. } => ("validation", 6),
        InterfaceError::Forbidden { .. } => ("unauthorized", 6),
        InterfaceError::Conflict { .. } => ("conflict", 6),
        InterfaceError::ServiceUnavailable { .. } => ("store_unavailable", 5),
    };
    (
        error_class,
        format!(
            "{} ({detail}; correlation_id={})",
            interface.user_message(),
            interface.correlation_id()
        ),
        exit_code,
    )
}
