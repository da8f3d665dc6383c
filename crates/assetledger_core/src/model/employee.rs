//! Employee read model.
//!
//! Employees are owned by an external directory; the lifecycle engine only
//! reads `employment_status` to decide whether an assignment is allowed.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

/// Surrogate identifier of an employee row.
pub type EmployeeId = Uuid;

/// Employment state as recorded by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    Active,
    Inactive,
    /// Still employed but not eligible to receive new assets.
    OnLeave,
}

impl EmploymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::OnLeave => "on_leave",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            "on_leave" => Some(Self::OnLeave),
            _ => None,
        }
    }

    /// Only active employees may receive assets.
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl Display for EmploymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmployeeValidationError {
    #[error("employee code must not be blank")]
    BlankCode,
    #[error("employee name must not be blank")]
    BlankName,
    #[error("employee email must contain `@`: `{0}`")]
    InvalidEmail(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    /// Company-issued code, e.g. `EMP001`.
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub employment_status: EmploymentStatus,
    /// Epoch ms.
    pub created_at: i64,
}

impl Employee {
    /// Creates an active employee with a generated id.
    pub fn hire(
        employee_code: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        hired_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            employee_code: employee_code.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            employment_status: EmploymentStatus::Active,
            created_at: hired_at,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn validate(&self) -> Result<(), EmployeeValidationError> {
        if self.employee_code.trim().is_empty() {
            return Err(EmployeeValidationError::BlankCode);
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(EmployeeValidationError::BlankName);
        }
        if !self.email.contains('@') {
            return Err(EmployeeValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Employee, EmployeeValidationError, EmploymentStatus};

    #[test]
    fn only_active_status_is_active() {
        assert!(EmploymentStatus::Active.is_active());
        assert!(!EmploymentStatus::Inactive.is_active());
        assert!(!EmploymentStatus::OnLeave.is_active());
    }

    #[test]
    fn hire_defaults_to_active() {
        let employee = Employee::hire("EMP001", "Ada", "Lovelace", "ada@example.com", 5);
        assert_eq!(employee.employment_status, EmploymentStatus::Active);
        assert_eq!(employee.full_name(), "Ada Lovelace");
        assert!(employee.validate().is_ok());
    }

    #[test]
    fn validate_rejects_malformed_email() {
        let employee = Employee::hire("EMP002", "Alan", "Turing", "alan.example.com", 5);
        assert_eq!(
            employee.validate(),
            Err(EmployeeValidationError::InvalidEmail(
                "alan.example.com".to_string()
            ))
        );
    }
}
