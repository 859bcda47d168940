//! Movement ledger primitives
//!
//! The functions in this module are the only code that writes ledger
//! entries or changes a product's cached stock and a batch's quantity.
//! Each one appends exactly one entry and applies the same signed
//! quantity to the product (and batch, when given).
//!
//! Callers must hold the product row lock in the transaction they pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    movement_value, validate_positive_quantity, validate_rate, MovementDirection, MovementKind,
    NewStockEntry, Product, StockEntry, StockReference,
};
use uuid::Uuid;
use validator::Validate;

use super::catalog::{require_batch, require_godown};
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx};

/// One positive-quantity movement about to be posted
#[derive(Debug, Clone)]
pub struct Movement {
    pub company_id: Uuid,
    pub product_id: Uuid,
    pub godown_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit: String,
    pub rate: Decimal,
    pub kind: MovementKind,
    pub reference: StockReference,
    pub narration: Option<String>,
    pub entry_date: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl Movement {
    fn into_entry(self, direction: MovementDirection) -> AppResult<NewStockEntry> {
        let quantity = direction.signed(self.quantity);
        Ok(NewStockEntry {
            id: Uuid::new_v4(),
            company_id: self.company_id,
            product_id: self.product_id,
            godown_id: self.godown_id,
            batch_id: self.batch_id,
            quantity,
            value: checked_value(quantity, self.rate)?,
            unit: self.unit,
            rate: self.rate,
            movement_kind: self.kind,
            reference: self.reference,
            narration: self.narration,
            entry_date: self.entry_date,
            created_by: self.created_by,
        })
    }
}

/// Entry value, or a validation error when quantity x rate is out of range
pub(crate) fn checked_value(quantity: Decimal, rate: Decimal) -> AppResult<Decimal> {
    movement_value(quantity, rate)
        .ok_or_else(|| AppError::validation("quantity", "Quantity times rate is out of range"))
}

fn check_movement(movement: &Movement, direction: MovementDirection) -> AppResult<()> {
    validate_positive_quantity(movement.quantity).map_err(|m| AppError::validation("quantity", m))?;
    validate_rate(movement.rate).map_err(|m| AppError::validation("rate", m))?;

    if movement.kind.direction() != direction {
        return Err(AppError::validation(
            "movement_kind",
            format!("{} is not an {} movement", movement.kind, direction.as_str()),
        ));
    }
    Ok(())
}

/// Append an inward entry and raise stock
pub(crate) async fn post_in(tx: &mut dyn LedgerTx, movement: Movement) -> AppResult<StockEntry> {
    check_movement(&movement, MovementDirection::Inward)?;
    require_godown(tx, movement.company_id, movement.godown_id).await?;
    if let Some(batch_id) = movement.batch_id {
        require_batch(tx, movement.company_id, movement.product_id, batch_id).await?;
    }

    let entry = tx.insert_entry(movement.into_entry(MovementDirection::Inward)?).await?;
    apply(tx, &entry).await?;
    Ok(entry)
}

/// Append an outward entry and lower stock.
///
/// Fails with `InsufficientStock` when the product (or the batch, when one
/// is given) holds less than the requested quantity.
pub(crate) async fn post_out(tx: &mut dyn LedgerTx, movement: Movement) -> AppResult<StockEntry> {
    check_movement(&movement, MovementDirection::Outward)?;
    require_godown(tx, movement.company_id, movement.godown_id).await?;

    let product = tx
        .get_product(movement.company_id, movement.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {}", movement.product_id)))?;
    if product.current_stock < movement.quantity {
        return Err(AppError::InsufficientStock {
            product_id: product.id,
            available: product.current_stock,
            requested: movement.quantity,
        });
    }

    if let Some(batch_id) = movement.batch_id {
        let batch = require_batch(tx, movement.company_id, movement.product_id, batch_id).await?;
        if batch.quantity < movement.quantity {
            return Err(AppError::InsufficientStock {
                product_id: product.id,
                available: batch.quantity,
                requested: movement.quantity,
            });
        }
    }

    let entry = tx.insert_entry(movement.into_entry(MovementDirection::Outward)?).await?;
    apply(tx, &entry).await?;
    Ok(entry)
}

/// Append the exact negation of `original` as an adjustment entry.
///
/// No sufficiency check: compensation may leave stock negative.
pub(crate) async fn post_compensation(
    tx: &mut dyn LedgerTx,
    original: &StockEntry,
    reference: StockReference,
    narration: Option<String>,
    entry_date: DateTime<Utc>,
    created_by: Option<Uuid>,
) -> AppResult<StockEntry> {
    let quantity = -original.quantity;
    let entry = NewStockEntry {
        id: Uuid::new_v4(),
        company_id: original.company_id,
        product_id: original.product_id,
        godown_id: original.godown_id,
        batch_id: original.batch_id,
        quantity,
        unit: original.unit.clone(),
        rate: original.rate,
        value: checked_value(quantity, original.rate)?,
        movement_kind: MovementKind::compensating(quantity),
        reference,
        narration,
        entry_date,
        created_by,
    };

    let entry = tx.insert_entry(entry).await?;
    apply(tx, &entry).await?;
    Ok(entry)
}

async fn apply(tx: &mut dyn LedgerTx, entry: &StockEntry) -> AppResult<()> {
    let stock = tx.apply_product_delta(entry.product_id, entry.quantity).await?;
    if let Some(batch_id) = entry.batch_id {
        tx.apply_batch_delta(batch_id, entry.quantity).await?;
    }
    tracing::debug!(
        product_id = %entry.product_id,
        entry_no = entry.entry_no,
        quantity = %entry.quantity,
        stock = %stock,
        "Ledger entry applied"
    );
    Ok(())
}

/// Lock one product for a standalone movement
async fn lock_product(tx: &mut dyn LedgerTx, company_id: Uuid, product_id: Uuid) -> AppResult<Product> {
    let product = tx
        .lock_products(company_id, &[product_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;

    if !product.is_active {
        return Err(AppError::validation(
            "product_id",
            format!("Product {} is inactive", product.sku),
        ));
    }
    Ok(product)
}

// ============================================================================
// Standalone movements
// ============================================================================

/// Input for a standalone inward or outward movement
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordMovementInput {
    pub product_id: Uuid,
    pub godown_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: Decimal,
    /// Required inward; outward defaults to the product's standard cost
    pub rate: Option<Decimal>,
    pub movement_kind: MovementKind,
    #[validate(length(min = 1, max = 50))]
    pub reference_type: String,
    pub reference_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub reference_number: Option<String>,
    pub narration: Option<String>,
    /// Defaults to now
    pub entry_date: Option<DateTime<Utc>>,
}

/// Records movements that arrive from other documents (purchases, sales, ...)
#[derive(Clone)]
pub struct MovementService {
    store: Arc<dyn LedgerStore>,
}

impl MovementService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Receive stock into a godown
    pub async fn record_in(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        input: RecordMovementInput,
    ) -> AppResult<StockEntry> {
        input.validate()?;
        let rate = input
            .rate
            .ok_or_else(|| AppError::validation("rate", "Rate is required for inward movements"))?;

        let mut tx = self.store.begin().await?;
        let product = lock_product(&mut *tx, company_id, input.product_id).await?;

        let movement = Self::movement(company_id, user_id, &product, rate, input);
        let entry = post_in(&mut *tx, movement).await?;
        tx.commit().await?;

        tracing::info!(
            entry_id = %entry.id,
            product_id = %entry.product_id,
            kind = %entry.movement_kind,
            quantity = %entry.quantity,
            "Stock received"
        );
        Ok(entry)
    }

    /// Issue stock from a godown
    pub async fn record_out(
        &self,
        company_id: Uuid,
        user_id: Option<Uuid>,
        input: RecordMovementInput,
    ) -> AppResult<StockEntry> {
        input.validate()?;

        let mut tx = self.store.begin().await?;
        let product = lock_product(&mut *tx, company_id, input.product_id).await?;

        let rate = input.rate.unwrap_or(product.standard_cost);
        let movement = Self::movement(company_id, user_id, &product, rate, input);
        let entry = post_out(&mut *tx, movement).await?;
        tx.commit().await?;

        tracing::info!(
            entry_id = %entry.id,
            product_id = %entry.product_id,
            kind = %entry.movement_kind,
            quantity = %entry.quantity,
            "Stock issued"
        );
        Ok(entry)
    }

    pub async fn get_entry(&self, company_id: Uuid, entry_id: Uuid) -> AppResult<StockEntry> {
        let mut tx = self.store.begin().await?;
        let entry = tx
            .get_entry(company_id, entry_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stock entry {}", entry_id)))?;
        tx.commit().await?;
        Ok(entry)
    }

    fn movement(
        company_id: Uuid,
        user_id: Option<Uuid>,
        product: &Product,
        rate: Decimal,
        input: RecordMovementInput,
    ) -> Movement {
        Movement {
            company_id,
            product_id: product.id,
            godown_id: input.godown_id,
            batch_id: input.batch_id,
            quantity: input.quantity,
            unit: product.unit.clone(),
            rate,
            kind: input.movement_kind,
            reference: StockReference::new(
                input.reference_type,
                input.reference_id,
                input.reference_number,
            ),
            narration: input.narration,
            entry_date: input.entry_date.unwrap_or_else(Utc::now),
            created_by: user_id,
        }
    }
}
