//! In-memory ledger store
//!
//! Used by tests and by `ledger.store = "memory"`. A transaction holds the
//! store mutex for its whole lifetime and mutates a working copy of the
//! state; `commit` writes the copy back and dropping the transaction
//! discards it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    net_movement, Batch, BillOfMaterial, BomComponent, Godown, ItemSide, JournalType, NewStockEntry,
    Product, StockEntry, StockJournal, StockJournalItem,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{EntryFilter, JournalFilter, LedgerStore, LedgerTx};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    products: BTreeMap<Uuid, Product>,
    godowns: BTreeMap<Uuid, Godown>,
    batches: BTreeMap<Uuid, Batch>,
    entries: Vec<StockEntry>,
    last_entry_no: i64,
    journals: BTreeMap<Uuid, StockJournal>,
    items: Vec<StockJournalItem>,
    voucher_sequences: HashMap<(Uuid, JournalType, i32), i32>,
    boms: BTreeMap<Uuid, BillOfMaterial>,
    components: Vec<BomComponent>,
}

/// Ledger store kept entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryLedgerTx { guard, work }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

fn sorted_by_key<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        let duplicate = self
            .work
            .products
            .values()
            .any(|p| p.company_id == product.company_id && p.sku == product.sku);
        if duplicate {
            return Err(AppError::DuplicateEntry("sku".to_string()));
        }
        self.work.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&mut self, company_id: Uuid, product_id: Uuid) -> AppResult<Option<Product>> {
        Ok(self
            .work
            .products
            .get(&product_id)
            .filter(|p| p.company_id == company_id)
            .cloned())
    }

    async fn list_products(&mut self, company_id: Uuid) -> AppResult<Vec<Product>> {
        let products: Vec<Product> = self
            .work
            .products
            .values()
            .filter(|p| p.company_id == company_id)
            .cloned()
            .collect();
        Ok(sorted_by_key(products, |p: &Product| p.sku.clone()))
    }

    async fn lock_products(&mut self, company_id: Uuid, product_ids: &[Uuid]) -> AppResult<Vec<Product>> {
        // BTreeMap iteration is already in ascending id order
        Ok(self
            .work
            .products
            .values()
            .filter(|p| p.company_id == company_id && product_ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn apply_product_delta(&mut self, product_id: Uuid, delta: Decimal) -> AppResult<Decimal> {
        let product = self
            .work
            .products
            .get_mut(&product_id)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        product.current_stock = product
            .current_stock
            .checked_add(delta)
            .ok_or_else(|| AppError::validation("quantity", "Stock balance is out of range"))?;
        product.updated_at = chrono::Utc::now();
        Ok(product.current_stock)
    }

    async fn set_product_active(&mut self, company_id: Uuid, product_id: Uuid, is_active: bool) -> AppResult<Option<Product>> {
        Ok(self
            .work
            .products
            .get_mut(&product_id)
            .filter(|p| p.company_id == company_id)
            .map(|product| {
                product.is_active = is_active;
                product.updated_at = chrono::Utc::now();
                product.clone()
            }))
    }

    async fn insert_godown(&mut self, godown: &Godown) -> AppResult<()> {
        if let Some(code) = &godown.code {
            let duplicate = self
                .work
                .godowns
                .values()
                .any(|g| g.company_id == godown.company_id && g.code.as_ref() == Some(code));
            if duplicate {
                return Err(AppError::DuplicateEntry("code".to_string()));
            }
        }
        self.work.godowns.insert(godown.id, godown.clone());
        Ok(())
    }

    async fn get_godown(&mut self, company_id: Uuid, godown_id: Uuid) -> AppResult<Option<Godown>> {
        Ok(self
            .work
            .godowns
            .get(&godown_id)
            .filter(|g| g.company_id == company_id)
            .cloned())
    }

    async fn list_godowns(&mut self, company_id: Uuid) -> AppResult<Vec<Godown>> {
        let godowns: Vec<Godown> = self
            .work
            .godowns
            .values()
            .filter(|g| g.company_id == company_id)
            .cloned()
            .collect();
        Ok(sorted_by_key(godowns, |g: &Godown| g.name.clone()))
    }

    async fn default_godown(&mut self, company_id: Uuid) -> AppResult<Option<Godown>> {
        Ok(self
            .work
            .godowns
            .values()
            .find(|g| g.company_id == company_id && g.is_default && g.is_active)
            .cloned())
    }

    async fn clear_default_godown(&mut self, company_id: Uuid) -> AppResult<()> {
        for godown in self.work.godowns.values_mut() {
            if godown.company_id == company_id {
                godown.is_default = false;
            }
        }
        Ok(())
    }

    async fn insert_batch(&mut self, batch: &Batch) -> AppResult<()> {
        let duplicate = self
            .work
            .batches
            .values()
            .any(|b| b.product_id == batch.product_id && b.batch_number == batch.batch_number);
        if duplicate {
            return Err(AppError::DuplicateEntry("batch_number".to_string()));
        }
        self.work.batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn get_batch(&mut self, company_id: Uuid, batch_id: Uuid) -> AppResult<Option<Batch>> {
        Ok(self
            .work
            .batches
            .get(&batch_id)
            .filter(|b| b.company_id == company_id)
            .cloned())
    }

    async fn list_batches(&mut self, company_id: Uuid, product_id: Option<Uuid>) -> AppResult<Vec<Batch>> {
        let batches: Vec<Batch> = self
            .work
            .batches
            .values()
            .filter(|b| b.company_id == company_id && product_id.map_or(true, |p| b.product_id == p))
            .cloned()
            .collect();
        // Dated batches first, earliest expiry first
        Ok(sorted_by_key(batches, |b: &Batch| {
            (b.expiry_date.is_none(), b.expiry_date, b.batch_number.clone())
        }))
    }

    async fn apply_batch_delta(&mut self, batch_id: Uuid, delta: Decimal) -> AppResult<Decimal> {
        let batch = self
            .work
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;
        batch.quantity = batch
            .quantity
            .checked_add(delta)
            .ok_or_else(|| AppError::validation("quantity", "Batch quantity is out of range"))?;
        Ok(batch.quantity)
    }

    // ------------------------------------------------------------------
    // Movement ledger
    // ------------------------------------------------------------------

    async fn insert_entry(&mut self, entry: NewStockEntry) -> AppResult<StockEntry> {
        self.work.last_entry_no += 1;
        let entry = entry.into_entry(self.work.last_entry_no);
        self.work.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, company_id: Uuid, entry_id: Uuid) -> AppResult<Option<StockEntry>> {
        Ok(self
            .work
            .entries
            .iter()
            .find(|e| e.id == entry_id && e.company_id == company_id)
            .cloned())
    }

    async fn list_entries(&mut self, filter: &EntryFilter) -> AppResult<Vec<StockEntry>> {
        let entries: Vec<StockEntry> = self
            .work
            .entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(sorted_by_key(entries, |e: &StockEntry| (e.entry_date, e.entry_no)))
    }

    async fn sum_entries(&mut self, filter: &EntryFilter) -> AppResult<Decimal> {
        Ok(net_movement(self.work.entries.iter().filter(|e| filter.matches(e))))
    }

    // ------------------------------------------------------------------
    // Stock journals
    // ------------------------------------------------------------------

    async fn next_voucher_sequence(&mut self, company_id: Uuid, journal_type: JournalType, year: i32) -> AppResult<i32> {
        let seq = self
            .work
            .voucher_sequences
            .entry((company_id, journal_type, year))
            .or_insert(0);
        *seq += 1;
        Ok(*seq)
    }

    async fn insert_journal(&mut self, journal: &StockJournal) -> AppResult<()> {
        let duplicate = self.work.journals.values().any(|j| {
            j.company_id == journal.company_id && j.voucher_number == journal.voucher_number
        });
        if duplicate {
            return Err(AppError::DuplicateEntry("voucher_number".to_string()));
        }
        self.work.journals.insert(journal.id, journal.clone());
        Ok(())
    }

    async fn update_journal(&mut self, journal: &StockJournal) -> AppResult<()> {
        match self.work.journals.get_mut(&journal.id) {
            Some(existing) => {
                *existing = journal.clone();
                Ok(())
            }
            None => Err(AppError::NotFound("Stock journal".to_string())),
        }
    }

    async fn get_journal(&mut self, company_id: Uuid, journal_id: Uuid) -> AppResult<Option<StockJournal>> {
        Ok(self
            .work
            .journals
            .get(&journal_id)
            .filter(|j| j.company_id == company_id)
            .cloned())
    }

    async fn lock_journal(&mut self, company_id: Uuid, journal_id: Uuid) -> AppResult<Option<StockJournal>> {
        // The transaction already holds the whole store
        self.get_journal(company_id, journal_id).await
    }

    async fn list_journals(&mut self, company_id: Uuid, filter: &JournalFilter) -> AppResult<Vec<StockJournal>> {
        let mut journals: Vec<StockJournal> = self
            .work
            .journals
            .values()
            .filter(|j| j.company_id == company_id && filter.matches(j))
            .cloned()
            .collect();
        journals.sort_by(|a, b| {
            b.journal_date
                .cmp(&a.journal_date)
                .then_with(|| b.voucher_number.cmp(&a.voucher_number))
        });
        Ok(journals
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn delete_journal(&mut self, journal_id: Uuid) -> AppResult<()> {
        self.work.journals.remove(&journal_id);
        self.work.items.retain(|i| i.journal_id != journal_id);
        Ok(())
    }

    async fn insert_journal_items(&mut self, items: &[StockJournalItem]) -> AppResult<()> {
        self.work.items.extend_from_slice(items);
        Ok(())
    }

    async fn list_journal_items(&mut self, journal_id: Uuid) -> AppResult<Vec<StockJournalItem>> {
        let items: Vec<StockJournalItem> = self
            .work
            .items
            .iter()
            .filter(|i| i.journal_id == journal_id)
            .cloned()
            .collect();
        Ok(sorted_by_key(items, |i: &StockJournalItem| {
            (i.side != ItemSide::Source, i.line_no)
        }))
    }

    async fn delete_journal_items(&mut self, journal_id: Uuid) -> AppResult<()> {
        self.work.items.retain(|i| i.journal_id != journal_id);
        Ok(())
    }

    async fn set_item_entry(&mut self, item_id: Uuid, entry_id: Uuid) -> AppResult<()> {
        if let Some(item) = self.work.items.iter_mut().find(|i| i.id == item_id) {
            item.stock_entry_id = Some(entry_id);
        }
        Ok(())
    }

    async fn set_item_reversal(&mut self, item_id: Uuid, entry_id: Uuid) -> AppResult<()> {
        if let Some(item) = self.work.items.iter_mut().find(|i| i.id == item_id) {
            item.reversal_entry_id = Some(entry_id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Bills of material
    // ------------------------------------------------------------------

    async fn insert_bom(&mut self, bom: &BillOfMaterial, components: &[BomComponent]) -> AppResult<()> {
        self.work.boms.insert(bom.id, bom.clone());
        self.work.components.extend_from_slice(components);
        Ok(())
    }

    async fn get_bom(&mut self, company_id: Uuid, bom_id: Uuid) -> AppResult<Option<BillOfMaterial>> {
        Ok(self
            .work
            .boms
            .get(&bom_id)
            .filter(|b| b.company_id == company_id)
            .cloned())
    }

    async fn list_boms(&mut self, company_id: Uuid) -> AppResult<Vec<BillOfMaterial>> {
        let boms: Vec<BillOfMaterial> = self
            .work
            .boms
            .values()
            .filter(|b| b.company_id == company_id)
            .cloned()
            .collect();
        Ok(sorted_by_key(boms, |b: &BillOfMaterial| b.name.clone()))
    }

    async fn set_bom_active(&mut self, company_id: Uuid, bom_id: Uuid, is_active: bool) -> AppResult<Option<BillOfMaterial>> {
        Ok(self
            .work
            .boms
            .get_mut(&bom_id)
            .filter(|b| b.company_id == company_id)
            .map(|bom| {
                bom.is_active = is_active;
                bom.clone()
            }))
    }

    async fn list_bom_components(&mut self, bom_id: Uuid) -> AppResult<Vec<BomComponent>> {
        Ok(self
            .work
            .components
            .iter()
            .filter(|c| c.bom_id == bom_id)
            .cloned()
            .collect())
    }

    // ------------------------------------------------------------------

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryLedgerTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
