//! Employee directory contract and SQLite implementation.
//!
//! # Responsibility
//! - Expose the read-only `employment_status` lookup the lifecycle engine
//!   depends on (`EmployeeDirectory`).
//! - Provide the minimal employee writes needed to populate the directory.

use crate::db::ensure_schema_ready;
use crate::model::employee::{Employee, EmployeeId, EmploymentStatus};
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const EMPLOYEE_SELECT_SQL: &str = "SELECT
    id,
    employee_code,
    first_name,
    last_name,
    email,
    employment_status,
    created_at
FROM employees";

/// Read-only view of employment state.
pub trait EmployeeDirectory {
    /// Returns `None` when the employee does not exist.
    fn employment_status(&self, id: EmployeeId) -> RepoResult<Option<EmploymentStatus>>;
}

/// Repository interface for employee rows.
pub trait EmployeeRepository: EmployeeDirectory {
    fn create_employee(&self, employee: &Employee) -> RepoResult<EmployeeId>;
    fn get_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>>;
    fn get_employee_by_code(&self, employee_code: &str) -> RepoResult<Option<Employee>>;
    /// Changes employment status, e.g. deactivation on termination.
    fn set_employment_status(&self, id: EmployeeId, status: EmploymentStatus)
        -> RepoResult<()>;
}

/// SQLite-backed employee repository.
pub struct SqliteEmployeeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEmployeeRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    /// Wraps a connection already checked by the caller, typically an open
    /// lifecycle transaction.
    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl EmployeeDirectory for SqliteEmployeeRepository<'_> {
    fn employment_status(&self, id: EmployeeId) -> RepoResult<Option<EmploymentStatus>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT employment_status FROM employees WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|text| {
                EmploymentStatus::parse(&text).ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "invalid employment status `{text}` in employees.employment_status"
                    ))
                })
            })
            .transpose()
    }
}

impl EmployeeRepository for SqliteEmployeeRepository<'_> {
    fn create_employee(&self, employee: &Employee) -> RepoResult<EmployeeId> {
        employee.validate()?;

        if self.get_employee_by_code(&employee.employee_code)?.is_some() {
            return Err(RepoError::DuplicateEmployeeCode(
                employee.employee_code.clone(),
            ));
        }

        self.conn.execute(
            "INSERT INTO employees (
                id,
                employee_code,
                first_name,
                last_name,
                email,
                employment_status,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                employee.id.to_string(),
                employee.employee_code.as_str(),
                employee.first_name.as_str(),
                employee.last_name.as_str(),
                employee.email.as_str(),
                employee.employment_status.as_str(),
                employee.created_at,
            ],
        )?;

        Ok(employee.id)
    }

    fn get_employee(&self, id: EmployeeId) -> RepoResult<Option<Employee>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EMPLOYEE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_employee_row(row)?));
        }
        Ok(None)
    }

    fn get_employee_by_code(&self, employee_code: &str) -> RepoResult<Option<Employee>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{EMPLOYEE_SELECT_SQL} WHERE employee_code = ?1;"))?;
        let mut rows = stmt.query([employee_code])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_employee_row(row)?));
        }
        Ok(None)
    }

    fn set_employment_status(
        &self,
        id: EmployeeId,
        status: EmploymentStatus,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE employees SET employment_status = ?2 WHERE id = ?1;",
            params![id.to_string(), status.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::EmployeeNotFound(id));
        }
        Ok(())
    }
}

fn parse_employee_row(row: &Row<'_>) -> RepoResult<Employee> {
    let id_text: String = row.get("id")?;
    let status_text: String = row.get("employment_status")?;
    let employment_status = EmploymentStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid employment status `{status_text}` in employees.employment_status"
        ))
    })?;

    Ok(Employee {
        id: parse_uuid(&id_text, "employees.id")?,
        employee_code: row.get("employee_code")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        email: row.get("email")?,
        employment_status,
        created_at: row.get("created_at")?,
    })
}
