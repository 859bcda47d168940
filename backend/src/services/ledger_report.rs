//! Ledger reconstruction and stock reports
//!
//! Balances here are rebuilt from ledger entries. The cached
//! `current_stock` is only read by `reconcile`, to compare against.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    build_stock_ledger, summarize_by_godown, Batch, DateWindow, GodownStockSummary, LowStockRow,
    Product, ReconciliationRow, StockLedger,
};
use uuid::Uuid;

use super::catalog::require_product;
use crate::error::{AppError, AppResult};
use crate::store::{EntryFilter, LedgerStore, LedgerTx};

const MAX_EXPIRY_HORIZON_DAYS: u32 = 3650;

/// Ledger report service
#[derive(Clone)]
pub struct LedgerReportService {
    store: Arc<dyn LedgerStore>,
}

/// Stock card query
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerQuery {
    pub product_id: Uuid,
    pub godown_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// A batch nearing its expiry date
#[derive(Debug, Clone, Serialize)]
pub struct ExpiringBatch {
    #[serde(flatten)]
    pub batch: Batch,
    pub sku: String,
    pub days_to_expiry: i64,
}

/// Ledger balance of one product: opening stock plus every entry
async fn ledger_balance(tx: &mut dyn LedgerTx, product: &Product) -> AppResult<Decimal> {
    let filter = EntryFilter {
        product_id: Some(product.id),
        ..EntryFilter::company(product.company_id)
    };
    Ok(product.opening_stock + tx.sum_entries(&filter).await?)
}

impl LedgerReportService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Stock card for one product over an inclusive date window.
    ///
    /// Opening balance is the product's opening stock (whole-company view
    /// only) plus every entry dated before the window.
    pub async fn get_ledger(&self, company_id: Uuid, query: LedgerQuery) -> AppResult<StockLedger> {
        let window = DateWindow::new(query.from, query.to);
        if !window.is_valid() {
            return Err(AppError::validation("from", "'from' must not be after 'to'"));
        }

        let mut tx = self.store.begin().await?;
        let product = require_product(&mut *tx, company_id, query.product_id).await?;
        if let Some(godown_id) = query.godown_id {
            tx.get_godown(company_id, godown_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Godown {}", godown_id)))?;
        }

        let base = EntryFilter {
            product_id: Some(product.id),
            godown_id: query.godown_id,
            ..EntryFilter::company(company_id)
        };

        let mut opening = match query.godown_id {
            Some(_) => Decimal::ZERO,
            None => product.opening_stock,
        };
        if let Some(start) = window.start() {
            let before = EntryFilter {
                before: Some(start),
                ..base.clone()
            };
            opening += tx.sum_entries(&before).await?;
        }

        let in_window = EntryFilter {
            from: window.start(),
            before: window.end_exclusive(),
            ..base
        };
        let entries = tx.list_entries(&in_window).await?;
        tx.commit().await?;

        tracing::debug!(product_id = %product.id, rows = entries.len(), "Stock ledger built");
        Ok(build_stock_ledger(product.id, query.godown_id, opening, entries))
    }

    /// Per godown and product totals, rebuilt from the ledger
    pub async fn godown_summary(&self, company_id: Uuid, godown_id: Option<Uuid>) -> AppResult<Vec<GodownStockSummary>> {
        let mut tx = self.store.begin().await?;
        let filter = EntryFilter {
            godown_id,
            ..EntryFilter::company(company_id)
        };
        let entries = tx.list_entries(&filter).await?;
        tx.commit().await?;

        Ok(summarize_by_godown(&entries))
    }

    /// Compare each product's cached stock with its ledger balance
    pub async fn reconcile(&self, company_id: Uuid) -> AppResult<Vec<ReconciliationRow>> {
        let mut tx = self.store.begin().await?;
        let products = tx.list_products(company_id).await?;

        let mut rows = Vec::with_capacity(products.len());
        for product in products {
            let ledger_stock = ledger_balance(&mut *tx, &product).await?;
            let row = ReconciliationRow {
                product_id: product.id,
                sku: product.sku,
                cached_stock: product.current_stock,
                ledger_stock,
                discrepancy: product.current_stock - ledger_stock,
            };
            if !row.is_balanced() {
                tracing::warn!(
                    product_id = %row.product_id,
                    sku = %row.sku,
                    cached = %row.cached_stock,
                    ledger = %row.ledger_stock,
                    "Cached stock disagrees with ledger"
                );
            }
            rows.push(row);
        }
        tx.commit().await?;

        Ok(rows)
    }

    /// Active products whose ledger balance is at or below their minimum level
    pub async fn low_stock(&self, company_id: Uuid) -> AppResult<Vec<LowStockRow>> {
        let mut tx = self.store.begin().await?;
        let products = tx.list_products(company_id).await?;

        let mut rows = Vec::new();
        for product in products
            .into_iter()
            .filter(|p| p.is_active && p.min_stock_level > Decimal::ZERO)
        {
            let ledger_stock = ledger_balance(&mut *tx, &product).await?;
            if ledger_stock <= product.min_stock_level {
                rows.push(LowStockRow {
                    product_id: product.id,
                    sku: product.sku,
                    name: product.name,
                    ledger_stock,
                    min_stock_level: product.min_stock_level,
                    shortfall: product.min_stock_level - ledger_stock,
                });
            }
        }
        tx.commit().await?;

        Ok(rows)
    }

    /// Batches holding stock that expire within `within_days` days of today
    pub async fn expiring_batches(&self, company_id: Uuid, within_days: u32) -> AppResult<Vec<ExpiringBatch>> {
        if within_days > MAX_EXPIRY_HORIZON_DAYS {
            return Err(AppError::validation(
                "within_days",
                format!("Horizon cannot exceed {} days", MAX_EXPIRY_HORIZON_DAYS),
            ));
        }

        let today = Utc::now().date_naive();
        let horizon = today
            .checked_add_days(Days::new(u64::from(within_days)))
            .ok_or_else(|| AppError::validation("within_days", "Horizon is out of range"))?;

        let mut tx = self.store.begin().await?;
        let products = tx.list_products(company_id).await?;
        let batches = tx.list_batches(company_id, None).await?;
        tx.commit().await?;

        let mut expiring: Vec<ExpiringBatch> = batches
            .into_iter()
            .filter(|b| b.quantity > Decimal::ZERO && b.expires_by(horizon))
            .filter_map(|batch| {
                let expiry = batch.expiry_date?;
                let sku = products
                    .iter()
                    .find(|p| p.id == batch.product_id)
                    .map(|p| p.sku.clone())
                    .unwrap_or_default();
                Some(ExpiringBatch {
                    days_to_expiry: (expiry - today).num_days(),
                    sku,
                    batch,
                })
            })
            .collect();
        expiring.sort_by_key(|e| (e.batch.expiry_date, e.batch.batch_number.clone()));

        Ok(expiring)
    }
}
