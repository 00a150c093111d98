//! peduli-admin: batch actions on the donation platform's admin lists.
//!
//! Fetches one page of an entity list, selects rows on it, and runs batch
//! delete or batch status changes through the orchestrator. Notifications
//! go to stderr; tables and reports go to stdout.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use peduli_client::HttpEntityApi;
use peduli_core::lifecycle::EntityKind;
use peduli_core::list_view::ListController;
use peduli_core::notify::NotificationBus;
use peduli_core::orchestrator::{BatchActionOrchestrator, BatchRun};
use peduli_core::remote::{AlwaysConfirm, Confirmer, ListQuery, DEFAULT_PAGE_LIMIT};
use peduli_core::types::DbId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod terminal;

use config::AdminConfig;

#[derive(Parser, Debug)]
#[command(name = "peduli-admin")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Skip the confirmation prompt
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show one page of rows
    #[command(alias = "ls")]
    List {
        #[arg(value_parser = EntityKind::from_str_value)]
        kind: EntityKind,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Delete rows whose status still allows it
    Delete {
        #[arg(value_parser = EntityKind::from_str_value)]
        kind: EntityKind,

        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Move rows to another status
    SetStatus {
        #[arg(value_parser = EntityKind::from_str_value)]
        kind: EntityKind,

        /// Target status, e.g. `dijadwalkan`
        #[arg(value_name = "STATUS")]
        new_status: String,

        #[command(flatten)]
        target: Target,

        /// Note sent along with the status change
        #[arg(long)]
        note: Option<String>,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Print a kind's status table
    Badges {
        #[arg(value_parser = EntityKind::from_str_value)]
        kind: EntityKind,
    },
}

/// Which page to fetch.
#[derive(Args, Debug, Clone)]
struct QueryArgs {
    /// Only rows in this status
    #[arg(long)]
    status: Option<String>,

    /// Free-text search
    #[arg(long)]
    search: Option<String>,

    /// Sort column, `-` prefix for descending
    #[arg(long, allow_hyphen_values = true)]
    sort: Option<String>,

    #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
    limit: u32,

    #[arg(long, default_value_t = 0)]
    offset: u32,
}

impl From<QueryArgs> for ListQuery {
    fn from(args: QueryArgs) -> Self {
        ListQuery {
            limit: args.limit,
            offset: args.offset,
            status: args.status,
            search: args.search,
            sort: args.sort,
        }
    }
}

/// Rows to act on. Both forms select only from the fetched page.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct Target {
    /// Comma-separated row ids
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    ids: Vec<DbId>,

    /// Every row on the fetched page
    #[arg(long)]
    all_visible: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AdminConfig::from_env().context("Invalid configuration")?;
    tracing::debug!(
        api = %config.client.base_url,
        concurrency = config.batch_concurrency,
        "Loaded admin configuration"
    );

    let bus = Arc::new(NotificationBus::default());
    let printer = terminal::spawn_printer(bus.subscribe());

    let result = run(cli, &config, Arc::clone(&bus)).await;

    // Closing the bus lets the printer drain and exit.
    drop(bus);
    let _ = printer.await;

    result
}

/// `LOG_FORMAT=json` switches to JSON lines. Logs go to stderr.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peduli_admin=info,peduli_core=info".into()),
        )
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(cli: Cli, config: &AdminConfig, bus: Arc<NotificationBus>) -> Result<ExitCode> {
    let confirmer: Arc<dyn Confirmer> = if cli.yes {
        Arc::new(AlwaysConfirm)
    } else {
        Arc::new(terminal::StdinConfirmer)
    };

    match cli.command {
        Commands::Badges { kind } => {
            print!("{}", terminal::render_badges(kind));
            Ok(ExitCode::SUCCESS)
        }
        Commands::List { kind, query } => {
            let view = open_view(config, kind, query.into()).await?;
            print_view(&view);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Delete {
            kind,
            target,
            query,
        } => {
            let view = open_view(config, kind, query.into()).await?;
            select(&view, &target)?;
            let orchestrator = orchestrator(config, bus, confirmer)?;
            let run = orchestrator.delete_selected(&view).await?;
            Ok(report(&view, run))
        }
        Commands::SetStatus {
            kind,
            new_status,
            target,
            note,
            query,
        } => {
            let view = open_view(config, kind, query.into()).await?;
            select(&view, &target)?;
            let metadata = match note {
                Some(note) => serde_json::json!({ "note": note }),
                None => serde_json::json!({}),
            };
            let orchestrator = orchestrator(config, bus, confirmer)?;
            let run = orchestrator
                .patch_status_selected(&view, &new_status, metadata)
                .await?;
            Ok(report(&view, run))
        }
    }
}

async fn open_view(
    config: &AdminConfig,
    kind: EntityKind,
    query: ListQuery,
) -> Result<ListController<HttpEntityApi>> {
    let api = Arc::new(HttpEntityApi::new(&config.client)?);
    let view = ListController::with_query(api, kind, query);
    view.refresh()
        .await
        .with_context(|| format!("Failed to load {}", kind.resource_path()))?;
    Ok(view)
}

fn orchestrator(
    config: &AdminConfig,
    bus: Arc<NotificationBus>,
    confirmer: Arc<dyn Confirmer>,
) -> Result<BatchActionOrchestrator> {
    Ok(BatchActionOrchestrator::new(bus)
        .with_confirmer(confirmer)
        .with_concurrency(config.batch_concurrency)?)
}

fn select(view: &ListController<HttpEntityApi>, target: &Target) -> Result<()> {
    if target.all_visible {
        view.toggle_all()?;
        return Ok(());
    }
    for &id in &target.ids {
        if !view.is_selected(id) {
            view.toggle(id)
                .with_context(|| format!("Row {id} is not on the fetched page"))?;
        }
    }
    Ok(())
}

fn print_view(view: &ListController<HttpEntityApi>) {
    print!(
        "{}",
        terminal::render_rows(
            view.kind(),
            &view.rows(),
            view.total(),
            view.query().offset,
            &view.selected_ids(),
        )
    );
}

/// Print the outcome and pick the exit code.
fn report(view: &ListController<HttpEntityApi>, run: BatchRun<peduli_client::ClientError>) -> ExitCode {
    match run {
        BatchRun::NothingSelected => {
            println!("Nothing selected.");
            ExitCode::FAILURE
        }
        BatchRun::NothingEligible { skipped } => {
            println!("None of the {} selected rows allow this action.", skipped.len());
            ExitCode::FAILURE
        }
        BatchRun::Declined => {
            println!("Cancelled.");
            ExitCode::SUCCESS
        }
        BatchRun::Completed(report) => {
            for failure in &report.outcome.failed {
                println!("  {} failed: {}", failure.id, failure_reason(&failure.error));
            }
            print_view(view);
            if !report.outcome.failed.is_empty() {
                let ids: Vec<String> = view.selected_ids().iter().map(DbId::to_string).collect();
                println!("Still selected for retry: {}", ids.join(", "));
            }
            tracing::info!(
                run_id = %report.run_id,
                succeeded = report.outcome.succeeded.len(),
                failed = report.outcome.failed.len(),
                skipped = report.skipped.len(),
                "Batch run complete"
            );
            if report.outcome.failed.is_empty() && report.refresh_error.is_none() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn failure_reason(error: &peduli_core::batch::ItemError<peduli_client::ClientError>) -> String {
    match error {
        peduli_core::batch::ItemError::Failed(err) => err.reason(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("peduli-admin").chain(args.iter().copied()))
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn delete_accepts_comma_separated_ids() {
        let cli = parse(&["delete", "banner", "--ids", "3,5,8", "--yes"]).unwrap();
        assert!(cli.yes);
        assert_matches!(
            cli.command,
            Commands::Delete { kind: EntityKind::Banner, target, .. } if target.ids == vec![3, 5, 8]
        );
    }

    #[test]
    fn target_is_required_and_exclusive() {
        assert!(parse(&["delete", "donation"]).is_err());
        assert!(parse(&["delete", "donation", "--ids", "1", "--all-visible"]).is_err());
    }

    #[test]
    fn set_status_keeps_filter_and_target_apart() {
        let cli = parse(&[
            "set-status",
            "pickup_request",
            "dijadwalkan",
            "--status",
            "baru",
            "--all-visible",
            "--note",
            "Ambil pagi",
        ])
        .unwrap();
        let Commands::SetStatus {
            kind,
            new_status,
            target,
            note,
            query,
        } = cli.command
        else {
            panic!("expected set-status");
        };
        assert_eq!(kind, EntityKind::PickupRequest);
        assert_eq!(new_status, "dijadwalkan");
        assert!(target.all_visible);
        assert_eq!(note.as_deref(), Some("Ambil pagi"));
        assert_eq!(query.status.as_deref(), Some("baru"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = parse(&["list", "donors"]).unwrap_err();
        assert!(err.to_string().contains("Invalid entity kind"));
    }

    #[test]
    fn query_args_map_onto_list_query() {
        let cli = parse(&["list", "article", "--sort", "-published_at", "--limit", "50"]).unwrap();
        let Commands::List { query, .. } = cli.command else {
            panic!("expected list");
        };
        let query = ListQuery::from(query);
        assert_eq!(query.limit, 50);
        assert_eq!(query.offset, 0);
        assert_eq!(query.sort.as_deref(), Some("-published_at"));
    }
}
