//! Versioned schema steps for the asset ledger database.
//!
//! # Invariants
//! - Step `n` lives at index `n - 1` of `SCHEMA_STEPS`; versions are implied
//!   by position and never renumbered.
//! - `PRAGMA user_version` always equals the last step applied.
//! - A database newer than this binary is refused, never downgraded.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

/// Schema steps in application order.
const SCHEMA_STEPS: &[(&str, &str)] = &[
    ("init", include_str!("0001_init.sql")),
    ("ledger_indexes", include_str!("0002_ledger_indexes.sql")),
];

/// Schema version produced by applying every known step.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.len() as u32
}

/// Brings `conn` up to [`latest_version`].
///
/// Runs under `BEGIN IMMEDIATE` so two processes bootstrapping the same file
/// cannot both apply the same step.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let from_version = current_user_version(&tx)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending = SCHEMA_STEPS.iter().zip(1u32..).skip(from_version as usize);
    for ((name, sql), version) in pending {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        info!("event=db_migrate module=db status=ok version={version} step={name}");
    }
    tx.commit()?;
    Ok(())
}

pub(crate) fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
