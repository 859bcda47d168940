//! Ledger reconstruction: stock cards and per-godown summaries
//!
//! Everything here is derived from ledger entries alone and never reads the
//! cached `Product::current_stock`.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MovementDirection, StockEntry};

/// One stock-card row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    #[serde(flatten)]
    pub entry: StockEntry,
    pub inward: Decimal,
    pub outward: Decimal,
    pub balance: Decimal,
}

/// Stock card for one product over a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLedger {
    pub product_id: Uuid,
    pub godown_id: Option<Uuid>,
    pub opening_balance: Decimal,
    pub entries: Vec<LedgerRow>,
    pub total_inward: Decimal,
    pub total_outward: Decimal,
    pub closing_balance: Decimal,
}

/// Fold entries into a running balance starting at `opening_balance`.
///
/// Entries must already be ordered by (entry_date, entry_no). Each entry is
/// classified by its movement kind, not by the sign of its quantity.
pub fn build_stock_ledger(
    product_id: Uuid,
    godown_id: Option<Uuid>,
    opening_balance: Decimal,
    entries: Vec<StockEntry>,
) -> StockLedger {
    let mut balance = opening_balance;
    let mut total_inward = Decimal::ZERO;
    let mut total_outward = Decimal::ZERO;

    let rows = entries
        .into_iter()
        .map(|entry| {
            let (inward, outward) = classify(&entry);
            balance += inward - outward;
            total_inward += inward;
            total_outward += outward;
            LedgerRow {
                entry,
                inward,
                outward,
                balance,
            }
        })
        .collect();

    StockLedger {
        product_id,
        godown_id,
        opening_balance,
        entries: rows,
        total_inward,
        total_outward,
        closing_balance: balance,
    }
}

/// Split an entry into (inward, outward) magnitudes by its kind
pub fn classify(entry: &StockEntry) -> (Decimal, Decimal) {
    match entry.movement_kind.direction() {
        MovementDirection::Inward => (entry.quantity.abs(), Decimal::ZERO),
        MovementDirection::Outward => (Decimal::ZERO, entry.quantity.abs()),
    }
}

/// Signed contribution of a set of entries, classified by kind
pub fn net_movement<'a>(entries: impl IntoIterator<Item = &'a StockEntry>) -> Decimal {
    entries
        .into_iter()
        .map(|e| {
            let (inward, outward) = classify(e);
            inward - outward
        })
        .sum()
}

/// Stock of one product in one godown, reconstructed from the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GodownStockSummary {
    pub godown_id: Uuid,
    pub product_id: Uuid,
    pub total_inward: Decimal,
    pub total_outward: Decimal,
    pub balance: Decimal,
    pub value_inward: Decimal,
    pub value_outward: Decimal,
}

/// Group entries by (godown, product) and total them
pub fn summarize_by_godown(entries: &[StockEntry]) -> Vec<GodownStockSummary> {
    let mut groups: BTreeMap<(Uuid, Uuid), GodownStockSummary> = BTreeMap::new();

    for entry in entries {
        let summary = groups
            .entry((entry.godown_id, entry.product_id))
            .or_insert_with(|| GodownStockSummary {
                godown_id: entry.godown_id,
                product_id: entry.product_id,
                total_inward: Decimal::ZERO,
                total_outward: Decimal::ZERO,
                balance: Decimal::ZERO,
                value_inward: Decimal::ZERO,
                value_outward: Decimal::ZERO,
            });

        let (inward, outward) = classify(entry);
        summary.total_inward += inward;
        summary.total_outward += outward;
        summary.balance += inward - outward;
        if inward > Decimal::ZERO {
            summary.value_inward += entry.value;
        } else {
            summary.value_outward += entry.value;
        }
    }

    groups.into_values().collect()
}

/// Cached counter vs ledger-derived balance for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRow {
    pub product_id: Uuid,
    pub sku: String,
    pub cached_stock: Decimal,
    pub ledger_stock: Decimal,
    pub discrepancy: Decimal,
}

impl ReconciliationRow {
    pub fn is_balanced(&self) -> bool {
        self.discrepancy.is_zero()
    }
}

/// A product at or below its minimum level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockRow {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub ledger_stock: Decimal,
    pub min_stock_level: Decimal,
    pub shortfall: Decimal,
}
