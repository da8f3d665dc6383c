//! Custody interval (ledger entry) model.
//!
//! # Invariants
//! - `returned_at == None` means the interval is open.
//! - `assigned_at` is immutable once written.
//! - `notes` only ever grows; closing appends with [`NOTES_DELIMITER`].

use crate::model::asset::AssetId;
use crate::model::employee::EmployeeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Surrogate identifier of a ledger row.
pub type IntervalId = Uuid;

/// Separator used when appending to interval notes.
pub const NOTES_DELIMITER: &str = " | ";

/// One custody period of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentInterval {
    pub id: IntervalId,
    pub asset_id: AssetId,
    /// `None` only for imported history with an unknown holder.
    pub employee_id: Option<EmployeeId>,
    /// Epoch ms.
    pub assigned_at: i64,
    /// Epoch ms. `None` while the asset is still held.
    pub returned_at: Option<i64>,
    pub assigned_by_admin_id: Option<EmployeeId>,
    pub notes: Option<String>,
}

impl AssignmentInterval {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Length of a closed interval in milliseconds.
    pub fn duration_ms(&self) -> Option<i64> {
        self.returned_at.map(|returned_at| returned_at - self.assigned_at)
    }
}

/// Appends `addition` to `existing` notes.
///
/// Blank additions leave the notes untouched.
pub fn append_note(existing: Option<&str>, addition: &str) -> Option<String> {
    let addition = addition.trim();
    match existing {
        _ if addition.is_empty() => existing.map(str::to_string),
        Some(current) if !current.is_empty() => {
            Some(format!("{current}{NOTES_DELIMITER}{addition}"))
        }
        _ => Some(addition.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::append_note;

    #[test]
    fn append_note_joins_with_delimiter() {
        assert_eq!(
            append_note(Some("Laptop handed over"), "Return note: scratched lid").as_deref(),
            Some("Laptop handed over | Return note: scratched lid")
        );
    }

    #[test]
    fn append_note_to_empty_notes_has_no_leading_delimiter() {
        assert_eq!(append_note(None, "first").as_deref(), Some("first"));
        assert_eq!(append_note(Some(""), "first").as_deref(), Some("first"));
    }

    #[test]
    fn blank_addition_keeps_existing_notes() {
        assert_eq!(append_note(Some("kept"), "   ").as_deref(), Some("kept"));
        assert_eq!(append_note(None, ""), None);
    }
}
