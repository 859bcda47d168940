//! Domain models used by the backend
//!
//! Re-exports the ledger, catalog, journal and BOM models from the shared crate

pub use shared::models::*;
