//! Domain model for assets, the employees who hold them, and custody history.
//!
//! # Responsibility
//! - Define canonical data structures used by the lifecycle engine and ledger.
//! - Keep storage encodings of enums next to the enums themselves.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - `Asset::current_employee_id` is set iff `Asset::status` is `Assigned`.
//! - Custody history is append-only; closed intervals are never rewritten.

pub mod asset;
pub mod assignment;
pub mod employee;
