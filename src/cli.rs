//! Maintenance CLI for the celltrace store.
//!
//! This is the operator-facing surface for the rare interventions the core
//! permits: inspecting the event log, remapping a misidentified material id,
//! and seeding the allocator at first-time setup. Day-to-day traffic goes
//! through the API layer, not this binary.

use crate::core::backend::{self, BackendConfig, BackendKind};
use crate::core::error::CelltraceError;
use crate::core::store::Store;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[clap(
    name = "celltrace",
    version = env!("CARGO_PKG_VERSION"),
    about = "Maintenance CLI for the celltrace material/event store."
)]
pub struct Cli {
    /// Path to the store database file.
    #[clap(long, global = true, default_value = "celltrace.db")]
    pub db: PathBuf,
    /// Output format for this command group.
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open or create the store, applying any pending schema upgrade.
    Init,
    /// Event log queries and the material remap maintenance operation.
    Log {
        #[clap(subcommand)]
        command: LogCommand,
    },
    /// Material identity allocator operations.
    Material {
        #[clap(subcommand)]
        command: MaterialCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// Dump entries whose end time falls in [start, end).
    Range {
        /// Window start, RFC 3339 (inclusive).
        #[clap(long)]
        start: String,
        /// Window end, RFC 3339 (exclusive).
        #[clap(long)]
        end: String,
    },
    /// Dump entries with counter strictly greater than the given one.
    After {
        #[clap(long)]
        counter: i64,
    },
    /// Remap every log reference from one material id to another.
    EditMaterial {
        #[clap(long)]
        old: i64,
        #[clap(long)]
        new: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum MaterialCommand {
    /// Allocate identity slots for a freshly loaded batch.
    Allocate {
        #[clap(long)]
        pallet: String,
        #[clap(long)]
        fixture: i64,
        /// Load time, RFC 3339.
        #[clap(long)]
        loaded: String,
        #[clap(long)]
        order: String,
        #[clap(long)]
        count: usize,
    },
    /// Re-resolve the batch loaded at or before the given instant.
    Resolve {
        #[clap(long)]
        pallet: String,
        #[clap(long)]
        fixture: i64,
        /// Instant, RFC 3339.
        #[clap(long)]
        at: String,
    },
    /// Seed the allocation floor at first-time setup (call at most once).
    SeedFirstId {
        #[clap(long)]
        id: i64,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = BackendConfig {
        kind: BackendKind::Sqlite,
        path: cli.db.clone(),
    };
    let store = backend::open_backend(&config)
        .with_context(|| format!("opening store at {}", cli.db.display()))?;

    match cli.command {
        Command::Init => {
            let version = store.schema_version()?;
            match cli.format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({ "path": store.path(), "schema_version": version })
                ),
                OutputFormat::Text => println!(
                    "store ready at {} (schema version {version})",
                    store.path().display()
                ),
            }
        }
        Command::Log { command } => run_log(&store, command, cli.format)?,
        Command::Material { command } => run_material(&store, command, cli.format)?,
    }
    Ok(())
}

fn run_log(store: &Store, command: LogCommand, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        LogCommand::Range { start, end } => {
            let entries = store.load_range(parse_utc(&start)?, parse_utc(&end)?)?;
            print_entries(&entries, format)?;
        }
        LogCommand::After { counter } => {
            let entries = store.load_after_counter(counter)?;
            print_entries(&entries, format)?;
        }
        LogCommand::EditMaterial { old, new } => {
            let updated = store.edit_material(old, new)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "rows_updated": updated }))
                }
                OutputFormat::Text => {
                    println!("remapped material {old} -> {new}: {updated} row(s) updated")
                }
            }
        }
    }
    Ok(())
}

fn run_material(
    store: &Store,
    command: MaterialCommand,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        MaterialCommand::Allocate {
            pallet,
            fixture,
            loaded,
            order,
            count,
        } => {
            let allocated = store.allocate(&pallet, fixture, parse_utc(&loaded)?, &order, count)?;
            match format {
                OutputFormat::Json => {
                    let rows: Vec<_> = allocated
                        .iter()
                        .map(|a| {
                            serde_json::json!({
                                "loc_counter": a.loc_counter,
                                "material_id": a.material_id,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::Value::Array(rows));
                }
                OutputFormat::Text => {
                    for a in &allocated {
                        println!("slot {} -> material {}", a.loc_counter, a.material_id);
                    }
                }
            }
        }
        MaterialCommand::Resolve {
            pallet,
            fixture,
            at,
        } => {
            let resolved = store.resolve(&pallet, fixture, parse_utc(&at)?)?;
            match format {
                OutputFormat::Json => {
                    let rows: Vec<_> = resolved
                        .iter()
                        .map(|r| {
                            serde_json::json!({
                                "loc_counter": r.loc_counter,
                                "order": r.order,
                                "material_id": r.material_id,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::Value::Array(rows));
                }
                OutputFormat::Text => {
                    if resolved.is_empty() {
                        println!("no batch loaded at or before that instant");
                    }
                    for r in &resolved {
                        println!(
                            "slot {} (order {}) -> material {}",
                            r.loc_counter, r.order, r.material_id
                        );
                    }
                }
            }
        }
        MaterialCommand::SeedFirstId { id } => {
            store.seed_first_material_id(id)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "seeded": id })),
                OutputFormat::Text => println!("allocation floor seeded at {id}"),
            }
        }
    }
    Ok(())
}

fn print_entries(entries: &[crate::core::events::LogEntry], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Text => {
            for e in entries {
                println!(
                    "#{} {:?} at {} [{} #{}] pallet={} result={} materials={}",
                    e.counter,
                    e.log_type,
                    e.end_time.to_rfc3339(),
                    e.location_name,
                    e.location_num,
                    if e.pallet.is_empty() { "-" } else { &e.pallet },
                    if e.result.is_empty() { "-" } else { &e.result },
                    e.material.len(),
                );
            }
        }
    }
    Ok(())
}

fn parse_utc(s: &str) -> Result<DateTime<Utc>, CelltraceError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CelltraceError::Validation(format!("invalid timestamp '{s}': {e}")))
}
