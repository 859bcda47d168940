//! Shared types and models for the stock ledger
//!
//! This crate holds the domain models of the movement ledger and the stock
//! journal engine, plus the pure rules they follow (movement-kind mapping,
//! voucher numbering, BOM expansion, ledger reconstruction).

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
