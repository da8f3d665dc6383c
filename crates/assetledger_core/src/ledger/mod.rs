//! Assignment ledger: the append-only record of asset custody.
//!
//! # Responsibility
//! - Open and close custody intervals.
//! - Answer "who holds this asset now" and "who held it before".
//!
//! # Invariants
//! - At most one open interval per asset; `open` re-checks this at write time.
//! - Rows are never deleted. Closing is the only mutation of an existing row.
//! - The ledger is the source of truth for custody; the holder pointer on the
//!   asset row is derived from it.

mod assignment_ledger;

pub use assignment_ledger::{
    AssignmentLedger, ClosedInterval, LedgerError, LedgerIntegrityWarning, LedgerResult,
    NewInterval,
};
