//! Asset lifecycle state machine.
//!
//! Pure transition rules; the service layer applies them inside a unit of
//! work together with ledger writes.
//!
//! | transition       | from                 | to         |
//! |------------------|----------------------|------------|
//! | `assign`         | in_stock             | assigned   |
//! | `return`         | assigned             | in_stock   |
//! | `send_to_repair` | in_stock, assigned   | in_repair  |
//! | `restore`        | in_repair            | in_stock   |
//! | `retire`         | any but retired      | retired    |

use crate::model::asset::AssetStatus;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Named lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Assign,
    Return,
    SendToRepair,
    Restore,
    Retire,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 5] = [
        TransitionKind::Assign,
        TransitionKind::Return,
        TransitionKind::SendToRepair,
        TransitionKind::Restore,
        TransitionKind::Retire,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Return => "return",
            Self::SendToRepair => "send_to_repair",
            Self::Restore => "restore",
            Self::Retire => "retire",
        }
    }

    /// State the asset ends up in after this transition.
    pub fn target(self) -> AssetStatus {
        match self {
            Self::Assign => AssetStatus::Assigned,
            Self::Return | Self::Restore => AssetStatus::InStock,
            Self::SendToRepair => AssetStatus::InRepair,
            Self::Retire => AssetStatus::Retired,
        }
    }

    pub fn is_allowed_from(self, from: AssetStatus) -> bool {
        match self {
            Self::Assign => from == AssetStatus::InStock,
            Self::Return => from == AssetStatus::Assigned,
            Self::SendToRepair => matches!(from, AssetStatus::InStock | AssetStatus::Assigned),
            Self::Restore => from == AssetStatus::InRepair,
            Self::Retire => !from.is_terminal(),
        }
    }
}

impl Display for TransitionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Custody effect of a validated transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustodyChange {
    /// Open a new ledger interval.
    Open,
    /// Close the open interval. `implicit` is set when the transition is not
    /// `return` itself but leaves an `Assigned` state.
    Close { implicit: bool },
    Unchanged,
}

/// A transition that passed the state check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub transition: TransitionKind,
    pub from: AssetStatus,
    pub to: AssetStatus,
    pub custody: CustodyChange,
}

/// Rejected state check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectedTransition {
    pub transition: TransitionKind,
    pub current: AssetStatus,
}

impl Display for RejectedTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.transition, self.current) {
            (transition, current) if current.is_terminal() => {
                write!(f, "{current} assets cannot {}", verb_phrase(transition))
            }
            (TransitionKind::Assign, AssetStatus::Assigned) => {
                f.write_str("asset is already assigned; return it first")
            }
            (TransitionKind::Return, _) => f.write_str("asset is not currently assigned"),
            (transition, current) => {
                write!(f, "cannot {transition} an asset that is {current}")
            }
        }
    }
}

fn verb_phrase(transition: TransitionKind) -> &'static str {
    match transition {
        TransitionKind::Assign => "be assigned",
        TransitionKind::Return => "be returned",
        TransitionKind::SendToRepair => "be sent to repair",
        TransitionKind::Restore => "be restored",
        TransitionKind::Retire => "be retired again",
    }
}

/// Checks `transition` against the current status and derives its custody
/// effect.
pub fn plan_transition(
    current: AssetStatus,
    transition: TransitionKind,
) -> Result<TransitionPlan, RejectedTransition> {
    if !transition.is_allowed_from(current) {
        return Err(RejectedTransition {
            transition,
            current,
        });
    }

    let custody = match (transition, current) {
        (TransitionKind::Assign, _) => CustodyChange::Open,
        (TransitionKind::Return, _) => CustodyChange::Close { implicit: false },
        (_, AssetStatus::Assigned) => CustodyChange::Close { implicit: true },
        _ => CustodyChange::Unchanged,
    };

    Ok(TransitionPlan {
        transition,
        from: current,
        to: transition.target(),
        custody,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(plan_transition(AssetStatus::InStock, TransitionKind::Assign).is_ok());
        assert!(plan_transition(AssetStatus::Assigned, TransitionKind::Return).is_ok());
        assert!(plan_transition(AssetStatus::InStock, TransitionKind::SendToRepair).is_ok());
        assert!(plan_transition(AssetStatus::Assigned, TransitionKind::SendToRepair).is_ok());
        assert!(plan_transition(AssetStatus::InRepair, TransitionKind::Restore).is_ok());
        assert!(plan_transition(AssetStatus::InStock, TransitionKind::Retire).is_ok());
        assert!(plan_transition(AssetStatus::Assigned, TransitionKind::Retire).is_ok());
        assert!(plan_transition(AssetStatus::InRepair, TransitionKind::Retire).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        assert!(plan_transition(AssetStatus::Assigned, TransitionKind::Assign).is_err());
        assert!(plan_transition(AssetStatus::InRepair, TransitionKind::Assign).is_err());
        assert!(plan_transition(AssetStatus::InStock, TransitionKind::Return).is_err());
        assert!(plan_transition(AssetStatus::InRepair, TransitionKind::SendToRepair).is_err());
        assert!(plan_transition(AssetStatus::InStock, TransitionKind::Restore).is_err());
        assert!(plan_transition(AssetStatus::Assigned, TransitionKind::Restore).is_err());
    }

    #[test]
    fn retired_is_terminal() {
        for transition in TransitionKind::ALL {
            let rejected = plan_transition(AssetStatus::Retired, transition).unwrap_err();
            assert_eq!(rejected.current, AssetStatus::Retired);
            assert_eq!(rejected.transition, transition);
            assert!(rejected.to_string().starts_with("retired assets cannot"));
        }
    }

    #[test]
    fn leaving_assigned_closes_custody() {
        let plan = plan_transition(AssetStatus::Assigned, TransitionKind::Return).unwrap();
        assert_eq!(plan.custody, CustodyChange::Close { implicit: false });

        let plan = plan_transition(AssetStatus::Assigned, TransitionKind::Retire).unwrap();
        assert_eq!(plan.custody, CustodyChange::Close { implicit: true });

        let plan = plan_transition(AssetStatus::InStock, TransitionKind::Retire).unwrap();
        assert_eq!(plan.custody, CustodyChange::Unchanged);

        let plan = plan_transition(AssetStatus::InStock, TransitionKind::Assign).unwrap();
        assert_eq!(plan.custody, CustodyChange::Open);
        assert_eq!(plan.to, AssetStatus::Assigned);
    }

    #[test]
    fn rejection_messages_name_the_problem() {
        let already = plan_transition(AssetStatus::Assigned, TransitionKind::Assign).unwrap_err();
        assert_eq!(already.to_string(), "asset is already assigned; return it first");

        let retired = plan_transition(AssetStatus::Retired, TransitionKind::Assign).unwrap_err();
        assert_eq!(retired.to_string(), "retired assets cannot be assigned");

        let restore = plan_transition(AssetStatus::InStock, TransitionKind::Restore).unwrap_err();
        assert_eq!(restore.to_string(), "cannot restore an asset that is in_stock");
    }
}
