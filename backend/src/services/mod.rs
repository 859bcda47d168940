//! Business logic services for the stock ledger

pub mod bom;
pub mod catalog;
pub mod ledger_report;
pub mod movement;
pub mod quick_journal;
pub mod stock_journal;

pub use bom::BomService;
pub use catalog::CatalogService;
pub use ledger_report::LedgerReportService;
pub use movement::MovementService;
pub use quick_journal::QuickJournalService;
pub use stock_journal::StockJournalService;
