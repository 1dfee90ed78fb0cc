pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use stockroom_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use stockroom_core::domain::actor::ActorId;
use stockroom_core::domain::movement::MovementKind;
use stockroom_core::domain::product::ProductId;
use stockroom_core::domain::request::{RequestId, RequestStatus};
use stockroom_core::reporting::ReportFilter;
use tracing_subscriber::EnvFilter;

use crate::commands::movements::RecordMovement;
use crate::commands::requests::RequestAction;

#[derive(Debug, Parser)]
#[command(
    name = "stockroom",
    about = "Stockroom operator CLI",
    long_about = "Operate the stockroom request store: migrations, demo data, request lifecycle and reports.",
    after_help = "Examples:\n  stockroom doctor --json\n  stockroom requests list --actor usr-admin-001 --status pending\n  stockroom movements record --actor usr-emp-001 --product prd-gloves-l --kind usage --quantity 2\n  stockroom report --from 2025-03-01 --to 2025-03-31"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this file instead of stockroom.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override database.url")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load and verify the deterministic demo dataset")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(subcommand, about = "List, create and decide inventory requests")]
    Requests(RequestsCommand),
    #[command(subcommand, about = "Log stock movements")]
    Movements(MovementsCommand),
    #[command(about = "Aggregate movements, requests and inventory into a JSON report")]
    Report(ReportArgs),
}

#[derive(Debug, Subcommand)]
enum MovementsCommand {
    #[command(about = "Record a movement and apply it to the product's stock")]
    Record {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        product: String,
        #[arg(long)]
        kind: MovementKind,
        #[arg(
            long,
            allow_hyphen_values = true,
            help = "Units moved; only adjustments may be negative"
        )]
        quantity: i64,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum RequestsCommand {
    #[command(about = "List the requests visible to an actor")]
    List {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        status: Option<RequestStatus>,
        #[arg(long, help = "Only requests filed by this actor (administrators only)")]
        requester: Option<String>,
        #[arg(long, help = "Case-insensitive text match on title, reason, requester and product")]
        q: Option<String>,
    },
    #[command(about = "File a new request for the acting employee")]
    Create {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        product: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        quantity: i64,
    },
    #[command(about = "Accept a pending request (administrators only)")]
    Approve {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        id: String,
    },
    #[command(about = "Reject a pending request (administrators only)")]
    Reject {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        id: String,
    },
    #[command(about = "Withdraw one of your own pending requests")]
    Cancel {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        id: String,
    },
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[arg(long, help = "First day included (YYYY-MM-DD)")]
    from: Option<NaiveDate>,
    #[arg(long, help = "Last day included (YYYY-MM-DD)")]
    to: Option<NaiveDate>,
    #[arg(long)]
    actor: Option<String>,
    #[arg(long)]
    product: Option<String>,
    #[arg(long)]
    kind: Option<MovementKind>,
    #[arg(long)]
    status: Option<RequestStatus>,
    #[arg(long)]
    q: Option<String>,
}

impl ReportArgs {
    fn into_filter(self) -> ReportFilter {
        ReportFilter {
            date_from: self.from,
            date_to: self.to,
            actor_id: self.actor.map(ActorId),
            product_id: self.product.map(ProductId),
            movement_kind: self.kind,
            request_status: self.status,
            q: self.q,
        }
    }
}

impl RequestsCommand {
    fn into_action(self) -> (ActorId, RequestAction) {
        match self {
            Self::List { actor, status, requester, q } => (
                ActorId(actor),
                RequestAction::List { status, requester: requester.map(ActorId), q },
            ),
            Self::Create { actor, product, title, reason, quantity } => (
                ActorId(actor),
                RequestAction::Create { product: ProductId(product), title, reason, quantity },
            ),
            Self::Approve { actor, id } => {
                (ActorId(actor), RequestAction::Approve { id: RequestId(id) })
            }
            Self::Reject { actor, id } => {
                (ActorId(actor), RequestAction::Reject { id: RequestId(id) })
            }
            Self::Cancel { actor, id } => {
                (ActorId(actor), RequestAction::Cancel { id: RequestId(id) })
            }
        }
    }
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

/// Installs the global subscriber on stderr so stdout stays a single JSON payload.
/// `RUST_LOG` wins over `logging.level` when set.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = installed {
        eprintln!("logging already initialized: {error}");
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    // Config errors surface through each command's own payload.
    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(options),
        Command::Seed => commands::seed::run(options),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(options) }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(options, json) }
        }
        Command::Requests(requests) => {
            let (actor_id, action) = requests.into_action();
            commands::requests::run(options, actor_id, action)
        }
        Command::Movements(MovementsCommand::Record { actor, product, kind, quantity, reason }) => {
            commands::movements::record(
                options,
                ActorId(actor),
                RecordMovement { product: ProductId(product), kind, quantity, reason },
            )
        }
        Command::Report(args) => commands::report::run(options, args.into_filter()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
