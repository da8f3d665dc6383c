//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the persistence-store and employee-directory contracts the
//!   lifecycle engine consumes.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Read paths reject undecodable persisted state instead of masking it.
//! - Repositories borrow a `Connection`; when that connection is a
//!   `Transaction`, every read and write joins the caller's unit of work.

use crate::db::DbError;
use crate::model::asset::AssetValidationError;
use crate::model::employee::{EmployeeId, EmployeeValidationError};
use thiserror::Error;
use uuid::Uuid;

pub mod asset_repo;
pub mod employee_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by asset and employee persistence.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    AssetValidation(#[from] AssetValidationError),
    #[error(transparent)]
    EmployeeValidation(#[from] EmployeeValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("employee not found: {0}")]
    EmployeeNotFound(EmployeeId),
    #[error("asset with tag `{0}` already exists")]
    DuplicateAssetTag(String),
    #[error("employee with code `{0}` already exists")]
    DuplicateEmployeeCode(String),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}
