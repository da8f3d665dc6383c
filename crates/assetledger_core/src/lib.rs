//! Core domain logic for asset custody tracking.
//!
//! The lifecycle engine in [`service::lifecycle_service`] is the only writer
//! of asset status and custody; everything else here supports it.

pub mod clock;
pub mod db;
pub mod ledger;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use ledger::{AssignmentLedger, ClosedInterval, LedgerError, LedgerIntegrityWarning};
pub use lifecycle::{plan_transition, CustodyChange, TransitionKind, TransitionPlan};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::asset::{Asset, AssetId, AssetStatus, AssetValidationError};
pub use model::assignment::{AssignmentInterval, IntervalId};
pub use model::employee::{Employee, EmployeeId, EmployeeValidationError, EmploymentStatus};
pub use repo::asset_repo::{AssetListQuery, AssetRepository, SqliteAssetRepository};
pub use repo::employee_repo::{EmployeeDirectory, EmployeeRepository, SqliteEmployeeRepository};
pub use repo::{RepoError, RepoResult};
pub use service::lifecycle_service::{
    AssignRequest, Holding, IntegrityViolation, LifecycleError, LifecycleResult,
    LifecycleService, PreconditionFailure, TransitionOutcome,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
