//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the asset ledger core.
//! - Apply schema migrations in deterministic order.
//! - Let repositories reject connections that were not bootstrapped here.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write ledger data before migrations succeed.

use rusqlite::Connection;
use thiserror::Error;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Connection was opened without running migrations.
    #[error("asset ledger requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

/// Verifies that `conn` has every known migration applied.
///
/// Repositories and the lifecycle service call this from their constructors
/// so a raw `Connection::open` cannot slip past the bootstrap path.
pub fn ensure_schema_ready(conn: &Connection) -> DbResult<()> {
    let expected_version = migrations::latest_version();
    let actual_version = migrations::current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(DbError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
