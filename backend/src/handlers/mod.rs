//! HTTP handlers

pub mod boms;
pub mod catalog;
pub mod health;
pub mod journals;
pub mod movements;
pub mod reports;

pub use boms::*;
pub use catalog::*;
pub use health::*;
pub use journals::*;
pub use movements::*;
pub use reports::*;
