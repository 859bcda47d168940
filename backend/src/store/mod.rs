//! Storage layer for the ledger
//!
//! Services talk to storage only through [`LedgerStore`] and the
//! transaction handle it hands out. Every write happens inside a
//! [`LedgerTx`]; dropping a transaction without calling `commit` discards
//! all of its writes.

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    Batch, BillOfMaterial, BomComponent, Godown, JournalStatus, JournalType, NewStockEntry,
    Product, StockEntry, StockJournal, StockJournalItem,
};
use uuid::Uuid;

use crate::error::AppResult;

/// Filter over ledger entries of one company
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub company_id: Uuid,
    pub product_id: Option<Uuid>,
    pub godown_id: Option<Uuid>,
    /// Inclusive lower bound on `entry_date`
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `entry_date`
    pub before: Option<DateTime<Utc>>,
}

impl EntryFilter {
    pub fn company(company_id: Uuid) -> Self {
        Self {
            company_id,
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &StockEntry) -> bool {
        entry.company_id == self.company_id
            && self.product_id.map_or(true, |p| entry.product_id == p)
            && self.godown_id.map_or(true, |g| entry.godown_id == g)
            && self.from.map_or(true, |f| entry.entry_date >= f)
            && self.before.map_or(true, |b| entry.entry_date < b)
    }
}

/// Filter over journal headers of one company
#[derive(Debug, Clone)]
pub struct JournalFilter {
    pub journal_type: Option<JournalType>,
    pub status: Option<JournalStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for JournalFilter {
    fn default() -> Self {
        Self {
            journal_type: None,
            status: None,
            from: None,
            to: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl JournalFilter {
    pub fn matches(&self, journal: &StockJournal) -> bool {
        self.journal_type.map_or(true, |t| journal.journal_type == t)
            && self.status.map_or(true, |s| journal.status == s)
            && self.from.map_or(true, |f| journal.journal_date >= f)
            && self.to.map_or(true, |t| journal.journal_date <= t)
    }
}

/// Source of ledger transactions
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// Open a transaction; all reads and writes go through it
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    /// Check connectivity
    async fn ping(&self) -> AppResult<()>;
}

/// One unit of work against the ledger store
#[async_trait]
pub trait LedgerTx: Send {
    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    async fn insert_product(&mut self, product: &Product) -> AppResult<()>;

    async fn get_product(&mut self, company_id: Uuid, product_id: Uuid) -> AppResult<Option<Product>>;

    async fn list_products(&mut self, company_id: Uuid) -> AppResult<Vec<Product>>;

    /// Lock the given product rows for the rest of the transaction, in
    /// ascending id order. Missing ids are simply absent from the result.
    async fn lock_products(&mut self, company_id: Uuid, product_ids: &[Uuid]) -> AppResult<Vec<Product>>;

    /// Set a product's active flag; `None` when it does not exist
    async fn set_product_active(&mut self, company_id: Uuid, product_id: Uuid, is_active: bool) -> AppResult<Option<Product>>;

    /// Add `delta` to the cached stock counter; returns the new value
    async fn apply_product_delta(&mut self, product_id: Uuid, delta: Decimal) -> AppResult<Decimal>;

    async fn insert_godown(&mut self, godown: &Godown) -> AppResult<()>;

    async fn get_godown(&mut self, company_id: Uuid, godown_id: Uuid) -> AppResult<Option<Godown>>;

    async fn list_godowns(&mut self, company_id: Uuid) -> AppResult<Vec<Godown>>;

    async fn default_godown(&mut self, company_id: Uuid) -> AppResult<Option<Godown>>;

    async fn clear_default_godown(&mut self, company_id: Uuid) -> AppResult<()>;

    async fn insert_batch(&mut self, batch: &Batch) -> AppResult<()>;

    async fn get_batch(&mut self, company_id: Uuid, batch_id: Uuid) -> AppResult<Option<Batch>>;

    async fn list_batches(&mut self, company_id: Uuid, product_id: Option<Uuid>) -> AppResult<Vec<Batch>>;

    /// Add `delta` to a batch quantity; returns the new value
    async fn apply_batch_delta(&mut self, batch_id: Uuid, delta: Decimal) -> AppResult<Decimal>;

    // ------------------------------------------------------------------
    // Movement ledger (append-only)
    // ------------------------------------------------------------------

    async fn insert_entry(&mut self, entry: NewStockEntry) -> AppResult<StockEntry>;

    async fn get_entry(&mut self, company_id: Uuid, entry_id: Uuid) -> AppResult<Option<StockEntry>>;

    /// Matching entries ordered by (entry_date, entry_no)
    async fn list_entries(&mut self, filter: &EntryFilter) -> AppResult<Vec<StockEntry>>;

    /// Signed quantity sum of matching entries
    async fn sum_entries(&mut self, filter: &EntryFilter) -> AppResult<Decimal>;

    // ------------------------------------------------------------------
    // Stock journals
    // ------------------------------------------------------------------

    /// Next voucher sequence for company/type/year; never hands out a number twice
    async fn next_voucher_sequence(&mut self, company_id: Uuid, journal_type: JournalType, year: i32) -> AppResult<i32>;

    async fn insert_journal(&mut self, journal: &StockJournal) -> AppResult<()>;

    async fn update_journal(&mut self, journal: &StockJournal) -> AppResult<()>;

    async fn get_journal(&mut self, company_id: Uuid, journal_id: Uuid) -> AppResult<Option<StockJournal>>;

    /// Fetch a journal and lock its row for the rest of the transaction
    async fn lock_journal(&mut self, company_id: Uuid, journal_id: Uuid) -> AppResult<Option<StockJournal>>;

    async fn list_journals(&mut self, company_id: Uuid, filter: &JournalFilter) -> AppResult<Vec<StockJournal>>;

    async fn delete_journal(&mut self, journal_id: Uuid) -> AppResult<()>;

    async fn insert_journal_items(&mut self, items: &[StockJournalItem]) -> AppResult<()>;

    /// Lines of a journal ordered by side (source first) then line number
    async fn list_journal_items(&mut self, journal_id: Uuid) -> AppResult<Vec<StockJournalItem>>;

    async fn delete_journal_items(&mut self, journal_id: Uuid) -> AppResult<()>;

    async fn set_item_entry(&mut self, item_id: Uuid, entry_id: Uuid) -> AppResult<()>;

    async fn set_item_reversal(&mut self, item_id: Uuid, entry_id: Uuid) -> AppResult<()>;

    // ------------------------------------------------------------------
    // Bills of material
    // ------------------------------------------------------------------

    async fn insert_bom(&mut self, bom: &BillOfMaterial, components: &[BomComponent]) -> AppResult<()>;

    async fn get_bom(&mut self, company_id: Uuid, bom_id: Uuid) -> AppResult<Option<BillOfMaterial>>;

    async fn list_boms(&mut self, company_id: Uuid) -> AppResult<Vec<BillOfMaterial>>;

    async fn set_bom_active(&mut self, company_id: Uuid, bom_id: Uuid, is_active: bool) -> AppResult<Option<BillOfMaterial>>;

    async fn list_bom_components(&mut self, bom_id: Uuid) -> AppResult<Vec<BomComponent>>;

    // ------------------------------------------------------------------

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
