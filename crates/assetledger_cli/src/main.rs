//! Operator CLI for the asset ledger.
//!
//! # Responsibility
//! - Open the database and start logging from flags or environment.
//! - Dispatch exactly one lifecycle operation or query per invocation.

use anyhow::{anyhow, bail, Context, Result};
use assetledger_core::{
    default_log_level, init_logging, open_db, Asset, AssetId, AssetRepository, AssignRequest,
    AssignmentInterval, Clock, Employee, EmployeeId, EmployeeRepository, EmploymentStatus,
    LifecycleService, LogTarget, SqliteAssetRepository, SqliteEmployeeRepository, SystemClock,
    TransitionOutcome,
};
use clap::{Parser, Subcommand};
use log::debug;
use rusqlite::Connection;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "assetledger", version, about = "Track asset custody and lifecycle")]
struct Cli {
    /// SQLite database file; created and migrated on first use.
    #[arg(long, env = "ASSETLEDGER_DB", default_value = "assetledger.db")]
    db: PathBuf,

    #[arg(long, env = "ASSETLEDGER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rotating log files. Logs go to stderr if unset.
    #[arg(long, env = "ASSETLEDGER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a new asset in stock.
    RegisterAsset {
        tag: String,
        name: String,
        #[arg(long)]
        serial: Option<String>,
    },
    /// Register a new active employee.
    RegisterEmployee {
        code: String,
        first_name: String,
        last_name: String,
        email: String,
    },
    /// Change an employee's employment status (active, inactive, on_leave).
    SetEmployment { employee: String, status: String },
    /// Hand an in-stock asset to an active employee.
    Assign {
        asset: String,
        employee: String,
        /// Employee code or id of the operator recording the assignment.
        #[arg(long)]
        by: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Take an assigned asset back into stock.
    Return {
        asset: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Send an asset to repair, returning it first if assigned.
    Repair { asset: String },
    /// Bring a repaired asset back into stock.
    Restore { asset: String },
    /// Retire an asset permanently, returning it first if assigned.
    Retire { asset: String },
    /// Print an asset's custody history, newest first.
    History { asset: String },
    /// List the assets an employee currently holds.
    Holdings { employee: String },
    /// Cross-check an asset against its custody ledger.
    Audit { asset: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let target = match &cli.log_dir {
        Some(dir) => LogTarget::directory(dir)?,
        None => LogTarget::Stderr,
    };
    init_logging(level, target).context("failed to initialize logging")?;

    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;
    debug!(
        "event=cli_dispatch module=cli status=start db={}",
        cli.db.display()
    );
    run(&conn, cli.command)
}

fn run(conn: &Connection, command: Command) -> Result<()> {
    let clock = SystemClock;
    let assets = SqliteAssetRepository::try_new(conn)?;
    let employees = SqliteEmployeeRepository::try_new(conn)?;
    let service = LifecycleService::try_new(conn)?;

    match command {
        Command::RegisterAsset { tag, name, serial } => {
            let mut asset = Asset::register(tag, name, clock.now_ms());
            if let Some(serial) = serial {
                asset = asset.with_serial_number(serial);
            }
            assets.create_asset(&asset)?;
            println!("registered {}", describe_asset(&asset));
        }
        Command::RegisterEmployee {
            code,
            first_name,
            last_name,
            email,
        } => {
            let employee = Employee::hire(code, first_name, last_name, email, clock.now_ms());
            employees.create_employee(&employee)?;
            println!(
                "registered employee {} ({}) id={}",
                employee.employee_code,
                employee.full_name(),
                employee.id
            );
        }
        Command::SetEmployment { employee, status } => {
            let employee_id = resolve_employee(&employees, &employee)?;
            let status = EmploymentStatus::parse(&status)
                .ok_or_else(|| anyhow!("unknown employment status `{status}`"))?;
            employees.set_employment_status(employee_id, status)?;
            println!("employee {employee_id} is now {status}");
        }
        Command::Assign {
            asset,
            employee,
            by,
            notes,
        } => {
            let mut request = AssignRequest::new(
                resolve_asset(&assets, &asset)?,
                resolve_employee(&employees, &employee)?,
            );
            if let Some(admin) = by {
                request = request.assigned_by(resolve_employee(&employees, &admin)?);
            }
            if let Some(notes) = notes.as_deref() {
                request = request.with_notes(notes);
            }
            print_outcome(&service.assign(&request)?);
        }
        Command::Return { asset, notes } => {
            let asset_id = resolve_asset(&assets, &asset)?;
            print_outcome(&service.return_asset(asset_id, notes.as_deref())?);
        }
        Command::Repair { asset } => {
            print_outcome(&service.send_to_repair(resolve_asset(&assets, &asset)?)?);
        }
        Command::Restore { asset } => {
            print_outcome(&service.restore(resolve_asset(&assets, &asset)?)?);
        }
        Command::Retire { asset } => {
            print_outcome(&service.retire(resolve_asset(&assets, &asset)?)?);
        }
        Command::History { asset } => {
            let history = service.asset_history(resolve_asset(&assets, &asset)?)?;
            if history.is_empty() {
                println!("no custody history");
            }
            for interval in &history {
                println!("{}", describe_interval(interval));
            }
        }
        Command::Holdings { employee } => {
            let holdings = service.holdings(resolve_employee(&employees, &employee)?)?;
            if holdings.is_empty() {
                println!("no assets held");
            }
            for holding in &holdings {
                println!(
                    "{} since={}",
                    describe_asset(&holding.asset),
                    holding.interval.assigned_at
                );
            }
        }
        Command::Audit { asset } => {
            let asset = service.audit_asset(resolve_asset(&assets, &asset)?)?;
            println!("consistent {}", describe_asset(&asset));
        }
    }
    Ok(())
}

/// Accepts an asset id or an asset tag.
fn resolve_asset(assets: &SqliteAssetRepository<'_>, key: &str) -> Result<AssetId> {
    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(id);
    }
    match assets.get_asset_by_tag(key)? {
        Some(asset) => Ok(asset.id),
        None => bail!("no asset with tag `{key}`"),
    }
}

/// Accepts an employee id or an employee code.
fn resolve_employee(employees: &SqliteEmployeeRepository<'_>, key: &str) -> Result<EmployeeId> {
    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(id);
    }
    match employees.get_employee_by_code(key)? {
        Some(employee) => Ok(employee.id),
        None => bail!("no employee with code `{key}`"),
    }
}

fn print_outcome(outcome: &TransitionOutcome) {
    println!(
        "{} {} -> {}: {}",
        outcome.plan.transition,
        outcome.plan.from,
        outcome.plan.to,
        describe_asset(&outcome.asset)
    );
    if let Some(closed) = &outcome.closed {
        println!("closed {}", describe_interval(&closed.interval));
    }
    if let Some(opened) = &outcome.opened {
        println!("opened {}", describe_interval(opened));
    }
}

fn describe_asset(asset: &Asset) -> String {
    let holder = asset
        .current_employee_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "asset {} ({}) id={} status={} holder={}",
        asset.asset_tag, asset.asset_name, asset.id, asset.status, holder
    )
}

fn describe_interval(interval: &AssignmentInterval) -> String {
    let employee = interval
        .employee_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let returned = interval
        .returned_at
        .map(|at| at.to_string())
        .unwrap_or_else(|| "open".to_string());
    format!(
        "interval {} employee={} assigned_at={} returned_at={} notes={}",
        interval.id,
        employee,
        interval.assigned_at,
        returned,
        interval.notes.as_deref().unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::{run, Cli, Command};
    use assetledger_core::{
        open_db_in_memory, AssetRepository, AssetStatus, LifecycleService, SqliteAssetRepository,
    };
    use clap::Parser;

    fn dispatch(conn: &rusqlite::Connection, args: &[&str]) -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["assetledger"].iter().chain(args))?;
        run(conn, cli.command)
    }

    #[test]
    fn run_dispatches_assign_return_and_history() {
        let conn = open_db_in_memory().unwrap();
        dispatch(&conn, &["register-asset", "AST-1", "ThinkPad", "--serial", "SN-1"]).unwrap();
        dispatch(&conn, &["register-employee", "EMP-1", "Ada", "Lovelace", "ada@example.com"])
            .unwrap();

        dispatch(&conn, &["assign", "AST-1", "EMP-1", "--notes", "desk 4"]).unwrap();
        let asset = SqliteAssetRepository::try_new(&conn)
            .unwrap()
            .get_asset_by_tag("AST-1")
            .unwrap()
            .unwrap();
        assert_eq!(asset.status, AssetStatus::Assigned);

        dispatch(&conn, &["return", "AST-1", "--notes", "ok"]).unwrap();
        dispatch(&conn, &["history", "AST-1"]).unwrap();

        let service = LifecycleService::try_new(&conn).unwrap();
        let history = service.asset_history(asset.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].notes.as_deref(), Some("desk 4 | Return note: ok"));
        assert_eq!(service.get_asset(asset.id).unwrap().status, AssetStatus::InStock);
    }

    #[test]
    fn run_reports_unknown_keys_and_rejected_transitions() {
        let conn = open_db_in_memory().unwrap();
        dispatch(&conn, &["register-asset", "AST-1", "Monitor"]).unwrap();

        let err = dispatch(&conn, &["history", "AST-404"]).unwrap_err();
        assert!(err.to_string().contains("no asset with tag `AST-404`"));

        let err = dispatch(&conn, &["return", "AST-1"]).unwrap_err();
        assert!(err.to_string().contains("not currently assigned"));
    }

    #[test]
    fn parses_assign_with_options() {
        let cli = Cli::try_parse_from([
            "assetledger",
            "--db",
            "/tmp/ledger.db",
            "assign",
            "AST-1",
            "EMP-1",
            "--by",
            "ADM-1",
            "--notes",
            "desk 4",
        ])
        .unwrap();
        match cli.command {
            Command::Assign {
                asset,
                employee,
                by,
                notes,
            } => {
                assert_eq!(asset, "AST-1");
                assert_eq!(employee, "EMP-1");
                assert_eq!(by.as_deref(), Some("ADM-1"));
                assert_eq!(notes.as_deref(), Some("desk 4"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn repair_requires_asset() {
        assert!(Cli::try_parse_from(["assetledger", "repair"]).is_err());
    }
}
