//! Lifecycle engine: applies asset transitions as atomic units of work.
//!
//! # Responsibility
//! - Validate transitions against the asset's state and the employee
//!   directory.
//! - Drive the assignment ledger and keep the asset's holder pointer derived
//!   from it.
//!
//! # Invariants
//! - Every transition runs inside one `BEGIN IMMEDIATE` transaction opened
//!   before the asset is read; rejection or failure rolls everything back.
//! - The ledger is cross-checked against the asset row before any write.
//!   Anomalies abort with `IntegrityViolation`; nothing is repaired silently.
//! - One clock read per transition stamps both the asset and the ledger row,
//!   clamped so `last_updated_at` never decreases.
//! - No retries. Callers re-submit and the state is re-validated from scratch.

use crate::clock::{Clock, SystemClock};
use crate::db::{ensure_schema_ready, DbError};
use crate::ledger::{AssignmentLedger, ClosedInterval, LedgerError, NewInterval};
use crate::lifecycle::{
    plan_transition, CustodyChange, RejectedTransition, TransitionKind, TransitionPlan,
};
use crate::model::asset::{Asset, AssetId, AssetStatus};
use crate::model::assignment::{AssignmentInterval, IntervalId};
use crate::model::employee::{EmployeeId, EmploymentStatus};
use crate::repo::asset_repo::{asset_exists, load_asset, write_lifecycle_state};
use crate::repo::employee_repo::{EmployeeDirectory, SqliteEmployeeRepository};
use crate::repo::RepoError;
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;
use thiserror::Error;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Cross-entity rule that blocked a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionFailure {
    #[error("employee {employee_id} is not active ({status})")]
    EmployeeNotActive {
        employee_id: EmployeeId,
        status: EmploymentStatus,
    },
}

/// Asset row and ledger disagree. Should never happen; always reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityViolation {
    #[error("asset {asset_id} has {} open intervals", .interval_ids.len())]
    MultipleOpenIntervals {
        asset_id: AssetId,
        interval_ids: Vec<IntervalId>,
    },
    #[error("asset {asset_id} is assigned but has no open interval")]
    MissingOpenInterval { asset_id: AssetId },
    #[error("asset {asset_id} is {status} but interval {interval_id} is still open")]
    UnexpectedOpenInterval {
        asset_id: AssetId,
        status: AssetStatus,
        interval_id: IntervalId,
    },
    #[error(
        "asset {asset_id} points at holder {asset_holder:?} but the ledger says {ledger_holder:?}"
    )]
    HolderMismatch {
        asset_id: AssetId,
        asset_holder: Option<EmployeeId>,
        ledger_holder: Option<EmployeeId>,
    },
    #[error("asset {asset_id} already has open interval {interval_id}")]
    OpenIntervalConflict {
        asset_id: AssetId,
        interval_id: IntervalId,
    },
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("asset not found: {0}")]
    AssetNotFound(AssetId),
    #[error("employee not found: {0}")]
    EmployeeNotFound(EmployeeId),
    #[error("asset {asset_id}: {}", describe_rejection(.transition, .current))]
    InvalidTransition {
        asset_id: AssetId,
        current: AssetStatus,
        transition: TransitionKind,
    },
    #[error(transparent)]
    PreconditionFailed(PreconditionFailure),
    #[error(transparent)]
    IntegrityViolation(IntegrityViolation),
    /// The compare-and-set on the asset row matched nothing.
    #[error("asset {asset_id} changed during the transition")]
    ConcurrentModification { asset_id: AssetId },
    #[error(transparent)]
    Ledger(LedgerError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl LifecycleError {
    /// Stable machine-readable code for logs and callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AssetNotFound(_) => "asset_not_found",
            Self::EmployeeNotFound(_) => "employee_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::IntegrityViolation(_) => "integrity_violation",
            Self::ConcurrentModification { .. } => "concurrent_modification",
            Self::Ledger(_) => "ledger_error",
            Self::Repo(_) => "storage_error",
        }
    }

    /// Whether the request was refused by a business rule, as opposed to the
    /// system failing or finding corrupted state.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::AssetNotFound(_)
                | Self::EmployeeNotFound(_)
                | Self::InvalidTransition { .. }
                | Self::PreconditionFailed(_)
        )
    }
}

fn describe_rejection(transition: &TransitionKind, current: &AssetStatus) -> RejectedTransition {
    RejectedTransition {
        transition: *transition,
        current: *current,
    }
}

impl From<LedgerError> for LifecycleError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Conflict {
                asset_id,
                interval_id,
            } => Self::IntegrityViolation(IntegrityViolation::OpenIntervalConflict {
                asset_id,
                interval_id,
            }),
            other => Self::Ledger(other),
        }
    }
}

impl From<IntegrityViolation> for LifecycleError {
    fn from(value: IntegrityViolation) -> Self {
        Self::IntegrityViolation(value)
    }
}

impl From<DbError> for LifecycleError {
    fn from(value: DbError) -> Self {
        Self::Repo(RepoError::Db(value))
    }
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}

/// Input for [`LifecycleService::assign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignRequest<'a> {
    pub asset_id: AssetId,
    pub employee_id: EmployeeId,
    pub assigned_by_admin_id: Option<EmployeeId>,
    pub notes: Option<&'a str>,
}

impl<'a> AssignRequest<'a> {
    pub fn new(asset_id: AssetId, employee_id: EmployeeId) -> Self {
        Self {
            asset_id,
            employee_id,
            assigned_by_admin_id: None,
            notes: None,
        }
    }

    pub fn assigned_by(mut self, admin_id: EmployeeId) -> Self {
        self.assigned_by_admin_id = Some(admin_id);
        self
    }

    pub fn with_notes(mut self, notes: &'a str) -> Self {
        self.notes = Some(notes);
        self
    }
}

/// Committed result of one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// Asset row as committed.
    pub asset: Asset,
    pub plan: TransitionPlan,
    /// Interval opened by `assign`.
    pub opened: Option<AssignmentInterval>,
    /// Interval closed by an explicit or implicit return.
    pub closed: Option<ClosedInterval>,
}

/// An asset currently held by an employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub asset: Asset,
    pub interval: AssignmentInterval,
}

#[derive(Debug, Clone, Copy)]
enum Intent<'a> {
    Assign(&'a AssignRequest<'a>),
    Return(Option<&'a str>),
    SendToRepair,
    Restore,
    Retire,
}

impl Intent<'_> {
    fn kind(&self) -> TransitionKind {
        match self {
            Self::Assign(_) => TransitionKind::Assign,
            Self::Return(_) => TransitionKind::Return,
            Self::SendToRepair => TransitionKind::SendToRepair,
            Self::Restore => TransitionKind::Restore,
            Self::Retire => TransitionKind::Retire,
        }
    }
}

/// Lifecycle engine bound to one connection.
pub struct LifecycleService<'conn, C: Clock = SystemClock> {
    conn: &'conn Connection,
    clock: C,
}

impl<'conn> LifecycleService<'conn, SystemClock> {
    /// Creates a service using the wall clock.
    pub fn try_new(conn: &'conn Connection) -> LifecycleResult<Self> {
        Self::with_clock(conn, SystemClock)
    }
}

impl<'conn, C: Clock> LifecycleService<'conn, C> {
    /// Creates a service with an explicit time source.
    pub fn with_clock(conn: &'conn Connection, clock: C) -> LifecycleResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, clock })
    }

    /// `InStock -> Assigned`; opens a ledger interval for an active employee.
    pub fn assign(&self, request: &AssignRequest<'_>) -> LifecycleResult<TransitionOutcome> {
        self.execute(request.asset_id, Intent::Assign(request))
    }

    /// `Assigned -> InStock`; closes the open interval.
    ///
    /// An assigned asset without an open interval is reported as
    /// [`IntegrityViolation::MissingOpenInterval`] and nothing is written.
    pub fn return_asset(
        &self,
        asset_id: AssetId,
        notes: Option<&str>,
    ) -> LifecycleResult<TransitionOutcome> {
        self.execute(asset_id, Intent::Return(notes))
    }

    /// `InStock | Assigned -> InRepair`, returning the asset first if held.
    pub fn send_to_repair(&self, asset_id: AssetId) -> LifecycleResult<TransitionOutcome> {
        self.execute(asset_id, Intent::SendToRepair)
    }

    /// `InRepair -> InStock`.
    pub fn restore(&self, asset_id: AssetId) -> LifecycleResult<TransitionOutcome> {
        self.execute(asset_id, Intent::Restore)
    }

    /// Any non-retired state `-> Retired`, returning the asset first if held.
    pub fn retire(&self, asset_id: AssetId) -> LifecycleResult<TransitionOutcome> {
        self.execute(asset_id, Intent::Retire)
    }

    pub fn get_asset(&self, asset_id: AssetId) -> LifecycleResult<Asset> {
        load_asset(self.conn, asset_id)?.ok_or(LifecycleError::AssetNotFound(asset_id))
    }

    /// Custody history, newest first.
    pub fn asset_history(&self, asset_id: AssetId) -> LifecycleResult<Vec<AssignmentInterval>> {
        if !asset_exists(self.conn, asset_id)? {
            return Err(LifecycleError::AssetNotFound(asset_id));
        }
        Ok(AssignmentLedger::new_unchecked(self.conn).history(asset_id)?)
    }

    /// Assets whose open interval belongs to `employee_id`.
    ///
    /// Intervals and asset rows are read from one snapshot.
    pub fn holdings(&self, employee_id: EmployeeId) -> LifecycleResult<Vec<Holding>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        let directory = SqliteEmployeeRepository::new_unchecked(&tx);
        if directory.employment_status(employee_id)?.is_none() {
            return Err(LifecycleError::EmployeeNotFound(employee_id));
        }

        let ledger = AssignmentLedger::new_unchecked(&tx);
        let mut holdings = Vec::new();
        for interval in ledger.open_for_employee(employee_id)? {
            let asset = load_asset(&tx, interval.asset_id)?
                .ok_or(LifecycleError::AssetNotFound(interval.asset_id))?;
            holdings.push(Holding { asset, interval });
        }
        tx.commit()?;
        Ok(holdings)
    }

    /// Cross-checks the asset row against the ledger without writing.
    pub fn audit_asset(&self, asset_id: AssetId) -> LifecycleResult<Asset> {
        let asset = self.get_asset(asset_id)?;
        let open = AssignmentLedger::new_unchecked(self.conn).open_intervals(asset_id)?;
        verify_custody(&asset, &open)?;
        Ok(asset)
    }

    fn execute(&self, asset_id: AssetId, intent: Intent<'_>) -> LifecycleResult<TransitionOutcome> {
        let transition = intent.kind();
        let started_at = Instant::now();
        let result = self.run_unit_of_work(asset_id, intent);

        match &result {
            Ok(outcome) => info!(
                "event=asset_transition module=lifecycle status=ok transition={} asset_id={} from={} to={} duration_ms={}",
                transition,
                asset_id,
                outcome.plan.from,
                outcome.plan.to,
                started_at.elapsed().as_millis()
            ),
            Err(err) if err.is_rejection() => info!(
                "event=asset_transition module=lifecycle status=rejected transition={} asset_id={} duration_ms={} error_code={}",
                transition,
                asset_id,
                started_at.elapsed().as_millis(),
                err.code()
            ),
            Err(err) => error!(
                "event=asset_transition module=lifecycle status=error transition={} asset_id={} duration_ms={} error_code={} error={}",
                transition,
                asset_id,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }

        result
    }

    fn run_unit_of_work(
        &self,
        asset_id: AssetId,
        intent: Intent<'_>,
    ) -> LifecycleResult<TransitionOutcome> {
        // Dropping `tx` on any early return rolls back.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let asset = load_asset(&tx, asset_id)?.ok_or(LifecycleError::AssetNotFound(asset_id))?;
        let now = self.clock.now_ms().max(asset.last_updated_at);

        let outcome = apply_transition(&tx, &asset, intent, now)?;
        tx.commit()?;
        Ok(outcome)
    }
}

fn apply_transition(
    conn: &Connection,
    asset: &Asset,
    intent: Intent<'_>,
    now: i64,
) -> LifecycleResult<TransitionOutcome> {
    let plan = plan_transition(asset.status, intent.kind()).map_err(|rejected| {
        LifecycleError::InvalidTransition {
            asset_id: asset.id,
            current: rejected.current,
            transition: rejected.transition,
        }
    })?;

    let ledger = AssignmentLedger::new_unchecked(conn);
    verify_custody(asset, &ledger.open_intervals(asset.id)?)?;

    let mut opened = None;
    let mut closed = None;
    match (plan.custody, intent) {
        (CustodyChange::Open, Intent::Assign(request)) => {
            require_active_employee(conn, request.employee_id)?;
            opened = Some(ledger.open(
                &NewInterval {
                    asset_id: asset.id,
                    employee_id: request.employee_id,
                    assigned_by_admin_id: request.assigned_by_admin_id,
                    notes: request.notes,
                },
                now,
            )?);
        }
        (CustodyChange::Close { implicit }, intent) => {
            let note = match intent {
                Intent::Return(Some(note)) if !note.trim().is_empty() => {
                    Some(format!("Return note: {}", note.trim()))
                }
                _ if implicit => Some(format!("Closed by {}", plan.transition)),
                _ => None,
            };
            let result = ledger
                .close_open(asset.id, note.as_deref(), now)?
                .ok_or(IntegrityViolation::MissingOpenInterval { asset_id: asset.id })?;
            closed = Some(result);
        }
        _ => {}
    }

    let holder = derive_holder(&ledger, asset.id, plan.to)?;
    if !write_lifecycle_state(conn, asset.id, plan.from, plan.to, holder, now)? {
        return Err(LifecycleError::ConcurrentModification { asset_id: asset.id });
    }

    let asset = load_asset(conn, asset.id)?.ok_or(LifecycleError::AssetNotFound(asset.id))?;
    Ok(TransitionOutcome {
        asset,
        plan,
        opened,
        closed,
    })
}

fn require_active_employee(conn: &Connection, employee_id: EmployeeId) -> LifecycleResult<()> {
    let directory = SqliteEmployeeRepository::new_unchecked(conn);
    match directory.employment_status(employee_id)? {
        None => Err(LifecycleError::EmployeeNotFound(employee_id)),
        Some(status) if !status.is_active() => Err(LifecycleError::PreconditionFailed(
            PreconditionFailure::EmployeeNotActive {
                employee_id,
                status,
            },
        )),
        Some(_) => Ok(()),
    }
}

/// Checks the asset row against its open ledger intervals.
fn verify_custody(asset: &Asset, open: &[AssignmentInterval]) -> Result<(), IntegrityViolation> {
    match open {
        [] if asset.status == AssetStatus::Assigned => {
            Err(IntegrityViolation::MissingOpenInterval { asset_id: asset.id })
        }
        [] if asset.current_employee_id.is_some() => Err(IntegrityViolation::HolderMismatch {
            asset_id: asset.id,
            asset_holder: asset.current_employee_id,
            ledger_holder: None,
        }),
        [] => Ok(()),
        [interval] if asset.status != AssetStatus::Assigned => {
            Err(IntegrityViolation::UnexpectedOpenInterval {
                asset_id: asset.id,
                status: asset.status,
                interval_id: interval.id,
            })
        }
        [interval]
            if interval.employee_id.is_none()
                || interval.employee_id != asset.current_employee_id =>
        {
            Err(IntegrityViolation::HolderMismatch {
                asset_id: asset.id,
                asset_holder: asset.current_employee_id,
                ledger_holder: interval.employee_id,
            })
        }
        [_] => Ok(()),
        many => Err(IntegrityViolation::MultipleOpenIntervals {
            asset_id: asset.id,
            interval_ids: many.iter().map(|interval| interval.id).collect(),
        }),
    }
}

/// Recomputes the holder pointer from the ledger after this transition's
/// ledger writes.
fn derive_holder(
    ledger: &AssignmentLedger<'_>,
    asset_id: AssetId,
    next_status: AssetStatus,
) -> LifecycleResult<Option<EmployeeId>> {
    let open = ledger.open_intervals(asset_id)?;
    match (open.as_slice(), next_status) {
        ([], AssetStatus::Assigned) => {
            Err(IntegrityViolation::MissingOpenInterval { asset_id }.into())
        }
        ([], _) => Ok(None),
        ([interval], AssetStatus::Assigned) => match interval.employee_id {
            Some(employee_id) => Ok(Some(employee_id)),
            None => Err(IntegrityViolation::HolderMismatch {
                asset_id,
                asset_holder: None,
                ledger_holder: None,
            }
            .into()),
        },
        ([interval], status) => Err(IntegrityViolation::UnexpectedOpenInterval {
            asset_id,
            status,
            interval_id: interval.id,
        }
        .into()),
        (many, _) => Err(IntegrityViolation::MultipleOpenIntervals {
            asset_id,
            interval_ids: many.iter().map(|interval| interval.id).collect(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::{verify_custody, IntegrityViolation, LifecycleError};
    use crate::lifecycle::TransitionKind;
    use crate::model::asset::{Asset, AssetStatus};
    use crate::model::assignment::AssignmentInterval;
    use uuid::Uuid;

    fn open_interval(asset: &Asset, employee_id: Option<Uuid>) -> AssignmentInterval {
        AssignmentInterval {
            id: Uuid::new_v4(),
            asset_id: asset.id,
            employee_id,
            assigned_at: 10,
            returned_at: None,
            assigned_by_admin_id: None,
            notes: None,
        }
    }

    #[test]
    fn consistent_states_pass() {
        let asset = Asset::register("AST-1", "Laptop", 0);
        assert!(verify_custody(&asset, &[]).is_ok());

        let mut assigned = asset.clone();
        let employee_id = Uuid::new_v4();
        assigned.status = AssetStatus::Assigned;
        assigned.current_employee_id = Some(employee_id);
        let interval = open_interval(&assigned, Some(employee_id));
        assert!(verify_custody(&assigned, &[interval]).is_ok());
    }

    #[test]
    fn assigned_without_open_interval_is_reported() {
        let mut asset = Asset::register("AST-2", "Laptop", 0);
        asset.status = AssetStatus::Assigned;
        asset.current_employee_id = Some(Uuid::new_v4());
        assert_eq!(
            verify_custody(&asset, &[]),
            Err(IntegrityViolation::MissingOpenInterval { asset_id: asset.id })
        );
    }

    #[test]
    fn open_interval_on_stocked_asset_is_reported() {
        let asset = Asset::register("AST-3", "Laptop", 0);
        let interval = open_interval(&asset, Some(Uuid::new_v4()));
        assert!(matches!(
            verify_custody(&asset, &[interval]),
            Err(IntegrityViolation::UnexpectedOpenInterval {
                status: AssetStatus::InStock,
                ..
            })
        ));
    }

    #[test]
    fn holder_pointer_must_match_ledger() {
        let mut asset = Asset::register("AST-4", "Laptop", 0);
        asset.status = AssetStatus::Assigned;
        asset.current_employee_id = Some(Uuid::new_v4());
        let interval = open_interval(&asset, Some(Uuid::new_v4()));
        assert!(matches!(
            verify_custody(&asset, &[interval]),
            Err(IntegrityViolation::HolderMismatch { .. })
        ));
    }

    #[test]
    fn two_open_intervals_are_reported() {
        let mut asset = Asset::register("AST-5", "Laptop", 0);
        let employee_id = Uuid::new_v4();
        asset.status = AssetStatus::Assigned;
        asset.current_employee_id = Some(employee_id);
        let first = open_interval(&asset, Some(employee_id));
        let second = open_interval(&asset, Some(employee_id));
        let err = verify_custody(&asset, &[first, second]).unwrap_err();
        assert!(
            matches!(err, IntegrityViolation::MultipleOpenIntervals { ref interval_ids, .. } if interval_ids.len() == 2)
        );
        assert!(err.to_string().contains("2 open intervals"));
    }

    #[test]
    fn invalid_transition_message_carries_state_and_transition() {
        let err = LifecycleError::InvalidTransition {
            asset_id: Uuid::nil(),
            current: AssetStatus::Retired,
            transition: TransitionKind::Assign,
        };
        assert_eq!(err.code(), "invalid_transition");
        assert!(err.is_rejection());
        assert!(err.to_string().contains("retired assets cannot be assigned"));
    }
}
