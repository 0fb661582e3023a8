//! Eternal Ledger CLI - seed and inspect a registry
//!
//! Every command opens the configured storage, seeds it from a TOML fixture
//! when it has no history yet, then reports on the registry. With in-memory
//! storage the registry lives only for the duration of the command; with
//! SQLite the first run seeds and later runs inspect.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use eternal_ledger::{EternalLedger, QueryWindow};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod fixture;
mod output;

use config::LedgerConfig;
use fixture::Fixture;
use output::{EventRow, OutputFormat, RecordRow, SeedRow, StatsRow};

/// Eternal Ledger CLI
#[derive(Parser)]
#[command(name = "eternal-ledger")]
#[command(about = "Eternal Ledger - identity binding and death registry", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ETERNAL_LEDGER_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configured level)
    #[arg(long, env = "ETERNAL_LEDGER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "ETERNAL_LEDGER_LOG_JSON")]
    json: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed from a fixture and summarize what it committed
    Seed {
        /// Fixture file (TOML)
        fixture: PathBuf,
    },

    /// Seed if empty, then list death records
    Records {
        fixture: PathBuf,

        /// Match a token id exactly or a content reference by substring
        #[arg(short, long, default_value = "")]
        filter: String,
    },

    /// Seed if empty, then print death statistics
    Stats { fixture: PathBuf },

    /// Seed if empty, then verify the event log and list it
    Events { fixture: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = LedgerConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let fixture_path = match &cli.command {
        Commands::Seed { fixture }
        | Commands::Records { fixture, .. }
        | Commands::Stats { fixture }
        | Commands::Events { fixture } => fixture.clone(),
    };
    let fixture = Fixture::load(&fixture_path)?;

    let storage = config.storage.open().await?;
    let ledger = EternalLedger::with_storage(storage, fixture.owner(), config.registry.clone())
        .await
        .context("failed to open registry")?;
    let report = fixture.seed(&ledger).await?;
    info!(
        fixture = %fixture_path.display(),
        applied = report.applied,
        registrars = report.registrars,
        bindings = report.bindings,
        deaths = report.deaths,
        "Fixture processed"
    );

    match cli.command {
        Commands::Seed { .. } => {
            if report.applied {
                output::print_success(&format!(
                    "Seeded {} registrars, {} bindings, {} deaths",
                    report.registrars, report.bindings, report.deaths
                ));
            } else {
                output::print_success("Store already seeded; nothing applied");
            }
            output::print_single::<_, SeedRow>(&report, cli.output)?;
        }
        Commands::Records { filter, .. } => {
            let records = ledger.search_records(&filter).await?;
            let rows: Vec<RecordRow> = records.iter().map(RecordRow::from).collect();
            output::print_output(rows, cli.output)?;
        }
        Commands::Stats { .. } => {
            let stats = ledger.get_death_statistics().await?;
            output::print_single::<_, StatsRow>(&stats, cli.output)?;
        }
        Commands::Events { .. } => {
            let verified = ledger.verify_event_log().await?;
            let events = ledger.events(QueryWindow::all()).await?;
            let rows: Vec<EventRow> = events.iter().map(EventRow::from).collect();
            output::print_output(rows, cli.output)?;
            output::print_success(&format!("Event log verified ({verified} events)"));
        }
    }

    Ok(())
}
