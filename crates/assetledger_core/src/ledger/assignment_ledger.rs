use crate::db::{ensure_schema_ready, DbError};
use crate::model::asset::AssetId;
use crate::model::assignment::{append_note, AssignmentInterval, IntervalId};
use crate::model::employee::EmployeeId;
use log::{debug, warn};
use rusqlite::{params, Connection, Row};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

const INTERVAL_SELECT_SQL: &str = "SELECT
    id,
    asset_id,
    employee_id,
    assigned_at,
    returned_at,
    assigned_by_admin_id,
    notes
FROM assignment_intervals";

/// Newest first. `rowid` breaks ties between intervals opened in the same
/// millisecond, so "most recently opened" is always well defined.
const NEWEST_FIRST: &str = "ORDER BY assigned_at DESC, rowid DESC";

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// An open interval already exists for the asset.
    #[error("asset {asset_id} already has open interval {interval_id}")]
    Conflict {
        asset_id: AssetId,
        interval_id: IntervalId,
    },
    /// The interval was closed between read and write.
    #[error("interval {0} is no longer open")]
    AlreadyClosed(IntervalId),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("invalid ledger data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Input for [`AssignmentLedger::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewInterval<'a> {
    pub asset_id: AssetId,
    pub employee_id: EmployeeId,
    pub assigned_by_admin_id: Option<EmployeeId>,
    pub notes: Option<&'a str>,
}

/// Raised when more than one open interval was found for an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerIntegrityWarning {
    pub asset_id: AssetId,
    /// The most recently opened interval, which was closed.
    pub closed_interval_id: IntervalId,
    /// Older open intervals left untouched for manual review.
    pub still_open: Vec<IntervalId>,
}

impl Display for LedgerIntegrityWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "asset {} had {} open intervals; closed {} and left {} open",
            self.asset_id,
            self.still_open.len() + 1,
            self.closed_interval_id,
            self.still_open.len()
        )
    }
}

/// Result of [`AssignmentLedger::close_open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedInterval {
    pub interval: AssignmentInterval,
    pub integrity_warning: Option<LedgerIntegrityWarning>,
}

/// Ledger operations over a borrowed connection.
///
/// Pass a `Transaction` to make ledger writes part of a larger unit of work.
pub struct AssignmentLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> AssignmentLedger<'conn> {
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Opens a new custody interval stamped `assigned_at = at`.
    ///
    /// Fails with [`LedgerError::Conflict`] when the asset already has an
    /// open interval.
    pub fn open(&self, entry: &NewInterval<'_>, at: i64) -> LedgerResult<AssignmentInterval> {
        if let Some(existing) = self.open_intervals(entry.asset_id)?.first() {
            return Err(LedgerError::Conflict {
                asset_id: entry.asset_id,
                interval_id: existing.id,
            });
        }

        let interval = AssignmentInterval {
            id: Uuid::new_v4(),
            asset_id: entry.asset_id,
            employee_id: Some(entry.employee_id),
            assigned_at: at,
            returned_at: None,
            assigned_by_admin_id: entry.assigned_by_admin_id,
            notes: entry.notes.and_then(|notes| append_note(None, notes)),
        };

        self.conn.execute(
            "INSERT INTO assignment_intervals (
                id,
                asset_id,
                employee_id,
                assigned_at,
                returned_at,
                assigned_by_admin_id,
                notes
            ) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6);",
            params![
                interval.id.to_string(),
                interval.asset_id.to_string(),
                entry.employee_id.to_string(),
                interval.assigned_at,
                interval.assigned_by_admin_id.map(|value| value.to_string()),
                interval.notes.as_deref(),
            ],
        )?;

        debug!(
            "event=ledger_open module=ledger status=ok asset_id={} interval_id={}",
            interval.asset_id, interval.id
        );
        Ok(interval)
    }

    /// Closes the open interval of `asset_id`, appending `note` if given.
    ///
    /// Returns `Ok(None)` when nothing is open. When several intervals are
    /// open, the most recently opened one is closed and the anomaly is
    /// logged and returned as a [`LedgerIntegrityWarning`].
    pub fn close_open(
        &self,
        asset_id: AssetId,
        note: Option<&str>,
        at: i64,
    ) -> LedgerResult<Option<ClosedInterval>> {
        let mut open = self.open_intervals(asset_id)?.into_iter();
        let Some(mut target) = open.next() else {
            return Ok(None);
        };
        let still_open: Vec<IntervalId> = open.map(|interval| interval.id).collect();

        let returned_at = at.max(target.assigned_at);
        let notes = match note {
            Some(note) => append_note(target.notes.as_deref(), note),
            None => target.notes.clone(),
        };

        let changed = self.conn.execute(
            "UPDATE assignment_intervals
             SET returned_at = ?2,
                 notes = ?3
             WHERE id = ?1
               AND returned_at IS NULL;",
            params![target.id.to_string(), returned_at, notes.as_deref()],
        )?;
        if changed == 0 {
            return Err(LedgerError::AlreadyClosed(target.id));
        }

        target.returned_at = Some(returned_at);
        target.notes = notes;

        let integrity_warning = if still_open.is_empty() {
            None
        } else {
            let warning = LedgerIntegrityWarning {
                asset_id,
                closed_interval_id: target.id,
                still_open,
            };
            warn!(
                "event=ledger_integrity_warning module=ledger status=warn asset_id={} closed_interval_id={} still_open={}",
                asset_id,
                target.id,
                warning.still_open.len()
            );
            Some(warning)
        };

        debug!(
            "event=ledger_close module=ledger status=ok asset_id={} interval_id={}",
            asset_id, target.id
        );
        Ok(Some(ClosedInterval {
            interval: target,
            integrity_warning,
        }))
    }

    /// Full custody history of an asset, newest first.
    pub fn history(&self, asset_id: AssetId) -> LedgerResult<Vec<AssignmentInterval>> {
        self.query_intervals(
            &format!("{INTERVAL_SELECT_SQL} WHERE asset_id = ?1 {NEWEST_FIRST};"),
            asset_id,
        )
    }

    /// Every open interval of an asset, newest first. More than one element
    /// means the ledger invariant is broken.
    pub fn open_intervals(&self, asset_id: AssetId) -> LedgerResult<Vec<AssignmentInterval>> {
        self.query_intervals(
            &format!(
                "{INTERVAL_SELECT_SQL} WHERE asset_id = ?1 AND returned_at IS NULL {NEWEST_FIRST};"
            ),
            asset_id,
        )
    }

    /// Open intervals held by one employee, newest first.
    pub fn open_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> LedgerResult<Vec<AssignmentInterval>> {
        self.query_intervals(
            &format!(
                "{INTERVAL_SELECT_SQL} WHERE employee_id = ?1 AND returned_at IS NULL {NEWEST_FIRST};"
            ),
            employee_id,
        )
    }

    fn query_intervals(&self, sql: &str, key: Uuid) -> LedgerResult<Vec<AssignmentInterval>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([key.to_string()])?;
        let mut intervals = Vec::new();
        while let Some(row) = rows.next()? {
            intervals.push(parse_interval_row(row)?);
        }
        Ok(intervals)
    }
}

fn parse_interval_row(row: &Row<'_>) -> LedgerResult<AssignmentInterval> {
    let id_text: String = row.get("id")?;
    let asset_text: String = row.get("asset_id")?;

    Ok(AssignmentInterval {
        id: parse_uuid(&id_text, "assignment_intervals.id")?,
        asset_id: parse_uuid(&asset_text, "assignment_intervals.asset_id")?,
        employee_id: parse_optional_uuid(row, "employee_id")?,
        assigned_at: row.get("assigned_at")?,
        returned_at: row.get("returned_at")?,
        assigned_by_admin_id: parse_optional_uuid(row, "assigned_by_admin_id")?,
        notes: row.get("notes")?,
    })
}

fn parse_optional_uuid(row: &Row<'_>, column: &'static str) -> LedgerResult<Option<Uuid>> {
    row.get::<_, Option<String>>(column)?
        .map(|value| parse_uuid(&value, column))
        .transpose()
}

fn parse_uuid(value: &str, column: &str) -> LedgerResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| LedgerError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
