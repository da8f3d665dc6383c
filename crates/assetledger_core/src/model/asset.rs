//! Asset domain model.
//!
//! # Responsibility
//! - Define the physical asset record and its lifecycle status.
//! - Validate the holder/status pairing before rows are persisted.
//!
//! # Invariants
//! - `asset_tag` is the immutable business key.
//! - `current_employee_id` is a derived cache of the open ledger interval and
//!   is only meaningful while `status == AssetStatus::Assigned`.
//! - `last_updated_at` never decreases across lifecycle mutations.

use crate::model::employee::EmployeeId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

/// Surrogate identifier of an asset row.
pub type AssetId = Uuid;

/// Lifecycle state of a physical asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Available in inventory. Initial state for new assets.
    InStock,
    /// In an employee's custody; an open ledger interval exists.
    Assigned,
    /// Out for repair; not assignable until restored.
    InRepair,
    /// Decommissioned. Terminal.
    Retired,
}

impl AssetStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [AssetStatus; 4] = [
        AssetStatus::InStock,
        AssetStatus::Assigned,
        AssetStatus::InRepair,
        AssetStatus::Retired,
    ];

    /// Storage and log encoding.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::Assigned => "assigned",
            Self::InRepair => "in_repair",
            Self::Retired => "retired",
        }
    }

    /// Parses the storage encoding produced by [`AssetStatus::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_stock" => Some(Self::InStock),
            "assigned" => Some(Self::Assigned),
            "in_repair" => Some(Self::InRepair),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }

    /// `Retired` is the only state no transition leaves.
    pub fn is_terminal(self) -> bool {
        self == Self::Retired
    }
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors for asset records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetValidationError {
    #[error("asset tag must not be blank")]
    BlankTag,
    #[error("asset name must not be blank")]
    BlankName,
    #[error("asset {asset_id} is assigned but has no current holder")]
    AssignedWithoutHolder { asset_id: AssetId },
    #[error("asset {asset_id} has holder {employee_id} while {status}")]
    HolderWithoutAssignment {
        asset_id: AssetId,
        employee_id: EmployeeId,
        status: AssetStatus,
    },
}

/// Physical asset owned by the organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    /// Unique barcode/RFID tag.
    pub asset_tag: String,
    pub asset_name: String,
    pub serial_number: Option<String>,
    pub status: AssetStatus,
    pub current_employee_id: Option<EmployeeId>,
    pub notes: Option<String>,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms. Refreshed by every lifecycle transition.
    pub last_updated_at: i64,
}

impl Asset {
    /// Creates an in-stock asset with a generated id.
    ///
    /// Both timestamps start at `registered_at`.
    pub fn register(
        asset_tag: impl Into<String>,
        asset_name: impl Into<String>,
        registered_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            asset_tag: asset_tag.into(),
            asset_name: asset_name.into(),
            serial_number: None,
            status: AssetStatus::InStock,
            current_employee_id: None,
            notes: None,
            created_at: registered_at,
            last_updated_at: registered_at,
        }
    }

    /// Builder-style setter for the serial number.
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Checks field shape and the holder/status invariant.
    pub fn validate(&self) -> Result<(), AssetValidationError> {
        if self.asset_tag.trim().is_empty() {
            return Err(AssetValidationError::BlankTag);
        }
        if self.asset_name.trim().is_empty() {
            return Err(AssetValidationError::BlankName);
        }
        self.validate_holder()
    }

    /// Checks only `current_employee_id is set <=> status == Assigned`.
    pub fn validate_holder(&self) -> Result<(), AssetValidationError> {
        match (self.status, self.current_employee_id) {
            (AssetStatus::Assigned, None) => Err(AssetValidationError::AssignedWithoutHolder {
                asset_id: self.id,
            }),
            (AssetStatus::Assigned, Some(_)) => Ok(()),
            (status, Some(employee_id)) => Err(AssetValidationError::HolderWithoutAssignment {
                asset_id: self.id,
                employee_id,
                status,
            }),
            (_, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Asset, AssetStatus, AssetValidationError};
    use uuid::Uuid;

    #[test]
    fn register_starts_in_stock_without_holder() {
        let asset = Asset::register("AST-001", "ThinkPad X1", 1_000);
        assert_eq!(asset.status, AssetStatus::InStock);
        assert_eq!(asset.current_employee_id, None);
        assert_eq!(asset.created_at, 1_000);
        assert_eq!(asset.last_updated_at, 1_000);
        assert!(asset.validate().is_ok());
    }

    #[test]
    fn status_encoding_roundtrips() {
        for status in AssetStatus::ALL {
            assert_eq!(AssetStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AssetStatus::parse("In Stock"), None);
    }

    #[test]
    fn validate_rejects_blank_tag_and_name() {
        let asset = Asset::register("  ", "Monitor", 0);
        assert_eq!(asset.validate(), Err(AssetValidationError::BlankTag));

        let asset = Asset::register("AST-002", "", 0);
        assert_eq!(asset.validate(), Err(AssetValidationError::BlankName));
    }

    #[test]
    fn validate_enforces_holder_iff_assigned() {
        let mut asset = Asset::register("AST-003", "Dock", 0);
        asset.status = AssetStatus::Assigned;
        assert!(matches!(
            asset.validate(),
            Err(AssetValidationError::AssignedWithoutHolder { .. })
        ));

        asset.current_employee_id = Some(Uuid::new_v4());
        assert!(asset.validate().is_ok());

        asset.status = AssetStatus::InRepair;
        assert!(matches!(
            asset.validate(),
            Err(AssetValidationError::HolderWithoutAssignment {
                status: AssetStatus::InRepair,
                ..
            })
        ));
    }

    #[test]
    fn only_retired_is_terminal() {
        let terminal: Vec<_> = AssetStatus::ALL
            .into_iter()
            .filter(|status| status.is_terminal())
            .collect();
        assert_eq!(terminal, vec![AssetStatus::Retired]);
    }
}
