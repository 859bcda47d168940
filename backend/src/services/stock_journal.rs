//! Stock journal engine
//!
//! A journal is a voucher with source lines (stock consumed or sent) and
//! destination lines (stock produced or received). Drafts have no ledger
//! effect. Confirmation posts every line to the ledger in one transaction,
//! and cancelling a confirmed journal posts one compensating entry per
//! line, leaving the original entries untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    allocate_additional_cost, format_voucher_number, reversal_reference_number,
    validate_positive_quantity, validate_rate, Godown, ItemSide, JournalStatus, JournalType,
    MovementKind, Pagination, Product, StockJournal, StockJournalItem, StockJournalWithItems, StockReference,
};
use uuid::Uuid;
use validator::Validate;

use super::catalog::{require_batch, require_godown, require_product};
use super::movement::{checked_value, post_compensation, post_in, post_out, Movement};
use crate::error::{AppError, AppResult};
use crate::store::{JournalFilter, LedgerStore, LedgerTx};

const REFERENCE_TYPE: &str = "stock_journal";
const REVERSAL_REFERENCE_TYPE: &str = "stock_journal_cancellation";

/// Stock journal service
#[derive(Clone)]
pub struct StockJournalService {
    store: Arc<dyn LedgerStore>,
}

/// One voucher line as submitted
#[derive(Debug, Clone, Deserialize)]
pub struct JournalLineInput {
    pub product_id: Uuid,
    /// Falls back to the header godown for the line's side, then the company default
    pub godown_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub quantity: Decimal,
    /// Defaults to the product's unit
    pub unit: Option<String>,
    /// Defaults to the product's standard cost
    pub rate: Option<Decimal>,
}

impl JournalLineInput {
    pub fn new(product_id: Uuid, quantity: Decimal) -> Self {
        Self {
            product_id,
            godown_id: None,
            batch_id: None,
            quantity,
            unit: None,
            rate: None,
        }
    }
}

/// Input for creating a draft journal
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateJournalInput {
    pub journal_type: JournalType,
    /// Defaults to today (UTC)
    pub journal_date: Option<NaiveDate>,
    pub source_godown_id: Option<Uuid>,
    pub destination_godown_id: Option<Uuid>,
    pub bom_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub narration: Option<String>,
    pub additional_cost: Option<Decimal>,
    #[serde(default)]
    pub source_items: Vec<JournalLineInput>,
    #[serde(default)]
    pub destination_items: Vec<JournalLineInput>,
}

impl CreateJournalInput {
    pub fn new(journal_type: JournalType) -> Self {
        Self {
            journal_type,
            journal_date: None,
            source_godown_id: None,
            destination_godown_id: None,
            bom_id: None,
            narration: None,
            additional_cost: None,
            source_items: Vec::new(),
            destination_items: Vec::new(),
        }
    }
}

/// Input for replacing the contents of a draft
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateJournalInput {
    pub source_godown_id: Option<Uuid>,
    pub destination_godown_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub narration: Option<String>,
    pub additional_cost: Option<Decimal>,
    #[serde(default)]
    pub source_items: Vec<JournalLineInput>,
    #[serde(default)]
    pub destination_items: Vec<JournalLineInput>,
}

/// Journal list filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListJournalsQuery {
    pub journal_type: Option<JournalType>,
    pub status: Option<JournalStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Header godowns used to resolve line godowns
struct HeaderGodowns {
    source: Option<Uuid>,
    destination: Option<Uuid>,
}

impl StockJournalService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Drafts
    // ========================================================================

    /// Create a draft journal with a fresh voucher number
    pub async fn create_journal(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        input: CreateJournalInput,
    ) -> AppResult<StockJournalWithItems> {
        input.validate()?;
        let additional_cost = check_additional_cost(input.additional_cost)?;

        let mut tx = self.store.begin().await?;

        check_header_godown(&mut *tx, company_id, input.source_godown_id).await?;
        check_header_godown(&mut *tx, company_id, input.destination_godown_id).await?;
        if let Some(bom_id) = input.bom_id {
            tx.get_bom(company_id, bom_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("BOM {}", bom_id)))?;
        }

        let journal_id = Uuid::new_v4();
        let header = HeaderGodowns {
            source: input.source_godown_id,
            destination: input.destination_godown_id,
        };
        let items = build_items(
            &mut *tx,
            company_id,
            journal_id,
            &header,
            input.source_items,
            input.destination_items,
        )
        .await?;

        let now = Utc::now();
        let journal_date = input.journal_date.unwrap_or_else(|| now.date_naive());
        let fiscal_year = journal_date.year();
        let voucher_seq = tx
            .next_voucher_sequence(company_id, input.journal_type, fiscal_year)
            .await?;

        let journal = StockJournal {
            id: journal_id,
            company_id,
            voucher_number: format_voucher_number(input.journal_type, fiscal_year, voucher_seq),
            voucher_seq,
            fiscal_year,
            journal_type: input.journal_type,
            status: JournalStatus::Draft,
            journal_date,
            source_godown_id: input.source_godown_id,
            destination_godown_id: input.destination_godown_id,
            bom_id: input.bom_id,
            narration: input.narration,
            additional_cost,
            created_by: user_id,
            created_at: now,
            confirmed_by: None,
            confirmed_at: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            updated_at: now,
        };

        tx.insert_journal(&journal).await?;
        tx.insert_journal_items(&items).await?;
        tx.commit().await?;

        tracing::info!(
            journal_id = %journal.id,
            voucher = %journal.voucher_number,
            journal_type = %journal.journal_type,
            lines = items.len(),
            "Stock journal created"
        );

        Ok(StockJournalWithItems::new(journal, items))
    }

    /// Replace header fields and the full line set of a draft
    pub async fn update_draft(
        &self,
        company_id: Uuid,
        journal_id: Uuid,
        input: UpdateJournalInput,
    ) -> AppResult<StockJournalWithItems> {
        input.validate()?;
        let additional_cost = check_additional_cost(input.additional_cost)?;

        let mut tx = self.store.begin().await?;
        let mut journal = lock_journal(&mut *tx, company_id, journal_id).await?;
        if journal.status != JournalStatus::Draft {
            return Err(AppError::InvalidState(format!(
                "Journal {} is {}; only drafts can be edited",
                journal.voucher_number, journal.status
            )));
        }

        check_header_godown(&mut *tx, company_id, input.source_godown_id).await?;
        check_header_godown(&mut *tx, company_id, input.destination_godown_id).await?;

        let header = HeaderGodowns {
            source: input.source_godown_id,
            destination: input.destination_godown_id,
        };
        let items = build_items(
            &mut *tx,
            company_id,
            journal.id,
            &header,
            input.source_items,
            input.destination_items,
        )
        .await?;

        journal.source_godown_id = input.source_godown_id;
        journal.destination_godown_id = input.destination_godown_id;
        journal.narration = input.narration;
        journal.additional_cost = additional_cost;
        journal.updated_at = Utc::now();

        tx.update_journal(&journal).await?;
        tx.delete_journal_items(journal.id).await?;
        tx.insert_journal_items(&items).await?;
        tx.commit().await?;

        tracing::info!(journal_id = %journal.id, lines = items.len(), "Stock journal draft updated");
        Ok(StockJournalWithItems::new(journal, items))
    }

    /// Remove a draft. Confirmed and cancelled journals are permanent.
    pub async fn delete_journal(&self, company_id: Uuid, journal_id: Uuid) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        let journal = lock_journal(&mut *tx, company_id, journal_id).await?;
        if journal.status != JournalStatus::Draft {
            return Err(AppError::InvalidState(format!(
                "Journal {} is {}; only drafts can be deleted",
                journal.voucher_number, journal.status
            )));
        }

        tx.delete_journal_items(journal.id).await?;
        tx.delete_journal(journal.id).await?;
        tx.commit().await?;

        tracing::info!(journal_id = %journal.id, voucher = %journal.voucher_number, "Stock journal draft deleted");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_journal(&self, company_id: Uuid, journal_id: Uuid) -> AppResult<StockJournalWithItems> {
        let mut tx = self.store.begin().await?;
        let journal = tx
            .get_journal(company_id, journal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stock journal {}", journal_id)))?;
        let items = tx.list_journal_items(journal.id).await?;
        tx.commit().await?;

        Ok(StockJournalWithItems::new(journal, items))
    }

    pub async fn list_journals(&self, company_id: Uuid, query: ListJournalsQuery) -> AppResult<Vec<StockJournal>> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::validation("from", "'from' must not be after 'to'"));
            }
        }

        let defaults = Pagination::default();
        let page = Pagination {
            page: query.page.unwrap_or(defaults.page),
            per_page: query.per_page.unwrap_or(defaults.per_page),
        };
        let filter = JournalFilter {
            journal_type: query.journal_type,
            status: query.status,
            from: query.from,
            to: query.to,
            limit: page.limit(),
            offset: page.offset(),
        };

        let mut tx = self.store.begin().await?;
        let journals = tx.list_journals(company_id, &filter).await?;
        tx.commit().await?;
        Ok(journals)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Post a draft to the ledger.
    ///
    /// Either every line produces its entry and the journal becomes
    /// confirmed, or nothing changes.
    pub async fn confirm_journal(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        journal_id: Uuid,
    ) -> AppResult<StockJournalWithItems> {
        let mut tx = self.store.begin().await?;
        let mut journal = lock_journal(&mut *tx, company_id, journal_id).await?;

        if journal.status != JournalStatus::Draft {
            return Err(AppError::InvalidState(format!(
                "Journal {} is {}; only drafts can be confirmed",
                journal.voucher_number, journal.status
            )));
        }

        let items = tx.list_journal_items(journal.id).await?;
        if items.is_empty() {
            return Err(AppError::validation(
                "items",
                format!("Journal {} has no lines", journal.voucher_number),
            ));
        }

        let products = lock_line_products(&mut *tx, company_id, &items).await?;
        check_sufficiency(&mut *tx, company_id, &items, &products).await?;

        let now = Utc::now();
        let reference = StockReference::new(
            REFERENCE_TYPE,
            Some(journal.id),
            Some(journal.voucher_number.clone()),
        );
        let (out_kind, in_kind) = journal.journal_type.movement_kinds();

        let (sources, destinations): (Vec<_>, Vec<_>) =
            items.iter().partition(|i| i.side == ItemSide::Source);

        for item in &sources {
            let entry = post_out(
                &mut *tx,
                line_movement(&journal, item, item.rate, out_kind, &reference, user_id, now),
            )
            .await?;
            tx.set_item_entry(item.id, entry.id).await?;
        }

        let weights: Vec<(Decimal, Decimal)> =
            destinations.iter().map(|i| (i.quantity, i.value)).collect();
        let uplifts = allocate_additional_cost(&weights, journal.additional_cost)
            .ok_or_else(|| AppError::validation("additional_cost", "Additional cost is out of range"))?;

        for (item, uplift) in destinations.iter().zip(uplifts) {
            let rate = item
                .rate
                .checked_add(uplift)
                .ok_or_else(|| AppError::validation("rate", "Rate is out of range"))?;
            let entry = post_in(
                &mut *tx,
                line_movement(&journal, item, rate, in_kind, &reference, user_id, now),
            )
            .await?;
            tx.set_item_entry(item.id, entry.id).await?;
        }

        journal.status = JournalStatus::Confirmed;
        journal.confirmed_by = user_id;
        journal.confirmed_at = Some(now);
        journal.updated_at = now;
        tx.update_journal(&journal).await?;

        let items = tx.list_journal_items(journal.id).await?;
        tx.commit().await?;

        tracing::info!(
            journal_id = %journal.id,
            voucher = %journal.voucher_number,
            journal_type = %journal.journal_type,
            source_lines = sources.len(),
            destination_lines = destinations.len(),
            "Stock journal confirmed"
        );

        Ok(StockJournalWithItems::new(journal, items))
    }

    /// Cancel a journal.
    ///
    /// A draft simply becomes cancelled. A confirmed journal gets one
    /// compensating entry per line, which may leave stock negative.
    pub async fn cancel_journal(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        journal_id: Uuid,
        reason: &str,
    ) -> AppResult<StockJournalWithItems> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::validation("reason", "A cancellation reason is required"));
        }

        let mut tx = self.store.begin().await?;
        let mut journal = lock_journal(&mut *tx, company_id, journal_id).await?;
        let was_confirmed = match journal.status {
            JournalStatus::Cancelled => {
                return Err(AppError::AlreadyCancelled(journal.voucher_number));
            }
            JournalStatus::Draft => false,
            JournalStatus::Confirmed => true,
        };

        let now = Utc::now();
        let items = tx.list_journal_items(journal.id).await?;

        if was_confirmed {
            lock_line_products(&mut *tx, company_id, &items).await?;

            let reversal_number = reversal_reference_number(&journal.voucher_number);
            let narration = Some(format!("Cancellation of {}: {}", journal.voucher_number, reason));

            for item in &items {
                let entry_id = item.stock_entry_id.ok_or_else(|| {
                    AppError::Internal(format!(
                        "Line {} of confirmed journal {} has no ledger entry",
                        item.line_no, journal.voucher_number
                    ))
                })?;
                let original = tx.get_entry(company_id, entry_id).await?.ok_or_else(|| {
                    AppError::Internal(format!("Ledger entry {} is missing", entry_id))
                })?;

                let reversal = post_compensation(
                    &mut *tx,
                    &original,
                    StockReference::new(
                        REVERSAL_REFERENCE_TYPE,
                        Some(journal.id),
                        Some(reversal_number.clone()),
                    ),
                    narration.clone(),
                    now,
                    user_id,
                )
                .await?;
                tx.set_item_reversal(item.id, reversal.id).await?;
            }
        }

        journal.status = JournalStatus::Cancelled;
        journal.cancelled_by = user_id;
        journal.cancelled_at = Some(now);
        journal.cancellation_reason = Some(reason.to_string());
        journal.updated_at = now;
        tx.update_journal(&journal).await?;

        let items = tx.list_journal_items(journal.id).await?;
        tx.commit().await?;

        tracing::info!(
            journal_id = %journal.id,
            voucher = %journal.voucher_number,
            reversed = was_confirmed,
            "Stock journal cancelled"
        );

        Ok(StockJournalWithItems::new(journal, items))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn check_additional_cost(additional_cost: Option<Decimal>) -> AppResult<Decimal> {
    let additional_cost = additional_cost.unwrap_or(Decimal::ZERO);
    if additional_cost < Decimal::ZERO {
        return Err(AppError::validation("additional_cost", "Additional cost cannot be negative"));
    }
    Ok(additional_cost)
}

async fn check_header_godown(tx: &mut dyn LedgerTx, company_id: Uuid, godown_id: Option<Uuid>) -> AppResult<()> {
    if let Some(godown_id) = godown_id {
        require_godown(tx, company_id, godown_id).await?;
    }
    Ok(())
}

async fn lock_journal(tx: &mut dyn LedgerTx, company_id: Uuid, journal_id: Uuid) -> AppResult<StockJournal> {
    tx.lock_journal(company_id, journal_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock journal {}", journal_id)))
}

/// Resolve submitted lines into stored lines, numbering each side from 1
async fn build_items(
    tx: &mut dyn LedgerTx,
    company_id: Uuid,
    journal_id: Uuid,
    header: &HeaderGodowns,
    source_lines: Vec<JournalLineInput>,
    destination_lines: Vec<JournalLineInput>,
) -> AppResult<Vec<StockJournalItem>> {
    let mut default_godown: Option<Option<Godown>> = None;
    let mut items = Vec::with_capacity(source_lines.len() + destination_lines.len());

    let sides = [
        (ItemSide::Source, header.source, source_lines),
        (ItemSide::Destination, header.destination, destination_lines),
    ];

    for (side, header_godown, lines) in sides {
        for (index, line) in lines.into_iter().enumerate() {
            validate_positive_quantity(line.quantity)
                .map_err(|m| AppError::validation("quantity", m))?;

            let product = require_product(tx, company_id, line.product_id).await?;
            if !product.is_active {
                return Err(AppError::validation(
                    "product_id",
                    format!("Product {} is inactive", product.sku),
                ));
            }

            let godown_id = match line.godown_id.or(header_godown) {
                Some(id) => id,
                None => {
                    if default_godown.is_none() {
                        default_godown = Some(tx.default_godown(company_id).await?);
                    }
                    default_godown
                        .as_ref()
                        .and_then(|g| g.as_ref())
                        .map(|g| g.id)
                        .ok_or_else(|| {
                            AppError::validation(
                                "godown_id",
                                format!(
                                    "No godown for {} line {} and no default godown is set",
                                    side.as_str(),
                                    index + 1
                                ),
                            )
                        })?
                }
            };
            require_godown(tx, company_id, godown_id).await?;

            if let Some(batch_id) = line.batch_id {
                require_batch(tx, company_id, product.id, batch_id).await?;
            }

            let rate = line.rate.unwrap_or(product.standard_cost);
            validate_rate(rate).map_err(|m| AppError::validation("rate", m))?;

            items.push(StockJournalItem {
                id: Uuid::new_v4(),
                journal_id,
                side,
                line_no: index as i32 + 1,
                product_id: product.id,
                godown_id,
                batch_id: line.batch_id,
                quantity: line.quantity,
                unit: line.unit.unwrap_or(product.unit),
                rate,
                value: checked_value(line.quantity, rate)?,
                stock_entry_id: None,
                reversal_entry_id: None,
            });
        }
    }

    Ok(items)
}

/// Lock every product the lines touch, in ascending id order
async fn lock_line_products(
    tx: &mut dyn LedgerTx,
    company_id: Uuid,
    items: &[StockJournalItem],
) -> AppResult<HashMap<Uuid, Product>> {
    let product_ids: Vec<Uuid> = items
        .iter()
        .map(|i| i.product_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    tracing::debug!(products = product_ids.len(), "Locking journal products");
    let locked = tx.lock_products(company_id, &product_ids).await?;

    if locked.len() != product_ids.len() {
        let missing = product_ids
            .iter()
            .find(|id| !locked.iter().any(|p| p.id == **id))
            .copied()
            .unwrap_or_default();
        return Err(AppError::NotFound(format!("Product {}", missing)));
    }

    Ok(locked.into_iter().map(|p| (p.id, p)).collect())
}

/// Verify every product and batch can cover the sum of its source lines
async fn check_sufficiency(
    tx: &mut dyn LedgerTx,
    company_id: Uuid,
    items: &[StockJournalItem],
    products: &HashMap<Uuid, Product>,
) -> AppResult<()> {
    let mut by_product: BTreeMap<Uuid, Decimal> = BTreeMap::new();
    let mut by_batch: BTreeMap<Uuid, (Uuid, Decimal)> = BTreeMap::new();

    let out_of_range = || AppError::validation("quantity", "Total requested quantity is out of range");
    for item in items.iter().filter(|i| i.side == ItemSide::Source) {
        let total = by_product.entry(item.product_id).or_default();
        *total = total.checked_add(item.quantity).ok_or_else(out_of_range)?;
        if let Some(batch_id) = item.batch_id {
            let (_, total) = by_batch.entry(batch_id).or_insert((item.product_id, Decimal::ZERO));
            *total = total.checked_add(item.quantity).ok_or_else(out_of_range)?;
        }
    }

    for (product_id, requested) in by_product {
        let available = products
            .get(&product_id)
            .map(|p| p.current_stock)
            .unwrap_or_default();
        if available < requested {
            return Err(AppError::InsufficientStock {
                product_id,
                available,
                requested,
            });
        }
    }

    for (batch_id, (product_id, requested)) in by_batch {
        let batch = require_batch(tx, company_id, product_id, batch_id).await?;
        if batch.quantity < requested {
            return Err(AppError::InsufficientStock {
                product_id,
                available: batch.quantity,
                requested,
            });
        }
    }

    Ok(())
}

fn line_movement(
    journal: &StockJournal,
    item: &StockJournalItem,
    rate: Decimal,
    kind: MovementKind,
    reference: &StockReference,
    user_id: Option<Uuid>,
    at: DateTime<Utc>,
) -> Movement {
    Movement {
        company_id: journal.company_id,
        product_id: item.product_id,
        godown_id: item.godown_id,
        batch_id: item.batch_id,
        quantity: item.quantity,
        unit: item.unit.clone(),
        rate,
        kind,
        reference: reference.clone(),
        narration: journal.narration.clone(),
        entry_date: at,
        created_by: user_id,
    }
}
