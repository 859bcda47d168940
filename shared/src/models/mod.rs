//! Domain models for the stock ledger

mod bom;
mod catalog;
mod journal;
mod ledger;
mod report;

pub use bom::*;
pub use catalog::*;
pub use journal::*;
pub use ledger::*;
pub use report::*;
