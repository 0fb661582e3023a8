//! Output formatting utilities

use colored::*;
use eternal_ledger::{DeathRecord, DeathStatistics, EventRecord};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::fixture::FixtureReport;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Debug, Serialize, Tabled)]
pub struct RecordRow {
    token: u64,
    identifier: String,
    owner: String,
    content_reference: String,
    recorded_by: String,
    created_at: String,
}

impl From<&DeathRecord> for RecordRow {
    fn from(record: &DeathRecord) -> Self {
        Self {
            token: record.token_id.0,
            identifier: record.identifier.to_string(),
            owner: record.owner.to_string(),
            content_reference: record.content_reference.to_string(),
            recorded_by: record.recorded_by.to_string(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct EventRow {
    sequence: u64,
    timestamp: String,
    kind: String,
    hash: String,
}

impl From<&EventRecord> for EventRow {
    fn from(record: &EventRecord) -> Self {
        Self {
            sequence: record.sequence,
            timestamp: record.timestamp.to_rfc3339(),
            kind: record.event.name().to_string(),
            hash: record.hash.chars().take(16).collect(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct StatsRow {
    total: u64,
    oldest_token: u64,
    newest_token: u64,
    registry_created_at: String,
}

impl From<&DeathStatistics> for StatsRow {
    fn from(stats: &DeathStatistics) -> Self {
        Self {
            total: stats.total,
            oldest_token: stats.oldest_token_id.0,
            newest_token: stats.newest_token_id.0,
            registry_created_at: stats.registry_created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct SeedRow {
    applied: bool,
    registrars: usize,
    bindings: usize,
    deaths: usize,
    minted: String,
}

impl From<&FixtureReport> for SeedRow {
    fn from(report: &FixtureReport) -> Self {
        Self {
            applied: report.applied,
            registrars: report.registrars,
            bindings: report.bindings,
            deaths: report.deaths,
            minted: report
                .minted
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Render a vector of items in the specified format
pub fn render_output<T: Serialize + Tabled>(data: Vec<T>, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Table if data.is_empty() => "No results".dimmed().to_string(),
        OutputFormat::Table => Table::new(data).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(&data)?,
    })
}

/// Render a single item: JSON as-is, or a one-row table of `R`
pub fn render_single<T, R>(data: &T, format: OutputFormat) -> anyhow::Result<String>
where
    T: Serialize,
    R: Tabled + for<'a> From<&'a T>,
{
    Ok(match format {
        OutputFormat::Table => Table::new(vec![R::from(data)]).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
    })
}

pub fn print_output<T: Serialize + Tabled>(data: Vec<T>, format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render_output(data, format)?);
    Ok(())
}

pub fn print_single<T, R>(data: &T, format: OutputFormat) -> anyhow::Result<()>
where
    T: Serialize,
    R: Tabled + for<'a> From<&'a T>,
{
    println!("{}", render_single::<T, R>(data, format)?);
    Ok(())
}

/// Status lines go to stderr so stdout stays machine-readable.
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message);
}
