//! Use-case services over the repositories and the ledger.
//!
//! # Responsibility
//! - Turn lifecycle requests into single atomic units of work.
//! - Keep the CLI decoupled from SQL and transaction handling.

pub mod lifecycle_service;
