//! Movement ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction a movement kind moves stock in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    Inward,
    Outward,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::Inward => "inward",
            MovementDirection::Outward => "outward",
        }
    }

    /// Sign applied to a positive quantity moving in this direction
    pub fn signed(&self, quantity: Decimal) -> Decimal {
        match self {
            MovementDirection::Inward => quantity,
            MovementDirection::Outward => -quantity,
        }
    }
}

/// Cause of a ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Purchase,
    Sale,
    TransferIn,
    TransferOut,
    AdjustmentIn,
    AdjustmentOut,
    ManufacturingIn,
    ManufacturingOut,
    RepackIn,
    RepackOut,
    ConversionIn,
    ConversionOut,
}

impl MovementKind {
    pub const ALL: [MovementKind; 12] = [
        MovementKind::Purchase,
        MovementKind::Sale,
        MovementKind::TransferIn,
        MovementKind::TransferOut,
        MovementKind::AdjustmentIn,
        MovementKind::AdjustmentOut,
        MovementKind::ManufacturingIn,
        MovementKind::ManufacturingOut,
        MovementKind::RepackIn,
        MovementKind::RepackOut,
        MovementKind::ConversionIn,
        MovementKind::ConversionOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Purchase => "purchase",
            MovementKind::Sale => "sale",
            MovementKind::TransferIn => "transfer_in",
            MovementKind::TransferOut => "transfer_out",
            MovementKind::AdjustmentIn => "adjustment_in",
            MovementKind::AdjustmentOut => "adjustment_out",
            MovementKind::ManufacturingIn => "manufacturing_in",
            MovementKind::ManufacturingOut => "manufacturing_out",
            MovementKind::RepackIn => "repack_in",
            MovementKind::RepackOut => "repack_out",
            MovementKind::ConversionIn => "conversion_in",
            MovementKind::ConversionOut => "conversion_out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        MovementKind::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// The designed classification of a kind, independent of quantity sign
    pub fn direction(&self) -> MovementDirection {
        match self {
            MovementKind::Purchase
            | MovementKind::TransferIn
            | MovementKind::AdjustmentIn
            | MovementKind::ManufacturingIn
            | MovementKind::RepackIn
            | MovementKind::ConversionIn => MovementDirection::Inward,
            MovementKind::Sale
            | MovementKind::TransferOut
            | MovementKind::AdjustmentOut
            | MovementKind::ManufacturingOut
            | MovementKind::RepackOut
            | MovementKind::ConversionOut => MovementDirection::Outward,
        }
    }

    pub fn is_inward(&self) -> bool {
        self.direction() == MovementDirection::Inward
    }

    /// Adjustment kind used for a compensating entry of the given signed quantity
    pub fn compensating(signed_quantity: Decimal) -> Self {
        if signed_quantity.is_sign_negative() {
            MovementKind::AdjustmentOut
        } else {
            MovementKind::AdjustmentIn
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer from a ledger entry back to the business document that caused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReference {
    pub reference_type: String,
    pub reference_id: Option<Uuid>,
    /// Human-readable document number (e.g., "ST-2024-0007")
    pub reference_number: Option<String>,
}

impl StockReference {
    pub fn new(reference_type: impl Into<String>, reference_id: Option<Uuid>, reference_number: Option<String>) -> Self {
        Self {
            reference_type: reference_type.into(),
            reference_id,
            reference_number,
        }
    }
}

/// A single immutable movement in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEntry {
    pub id: Uuid,
    /// Store-assigned, strictly increasing; breaks ties between equal timestamps
    pub entry_no: i64,
    pub company_id: Uuid,
    pub product_id: Uuid,
    pub godown_id: Uuid,
    pub batch_id: Option<Uuid>,
    /// Positive = inward, negative = outward
    pub quantity: Decimal,
    pub unit: String,
    pub rate: Decimal,
    /// |quantity| x rate
    pub value: Decimal,
    pub movement_kind: MovementKind,
    #[serde(flatten)]
    pub reference: StockReference,
    pub narration: Option<String>,
    pub entry_date: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// A ledger entry before the store assigns its sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct NewStockEntry {
    pub id: Uuid,
    pub company_id: Uuid,
    pub product_id: Uuid,
    pub godown_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit: String,
    pub rate: Decimal,
    pub value: Decimal,
    pub movement_kind: MovementKind,
    pub reference: StockReference,
    pub narration: Option<String>,
    pub entry_date: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

impl NewStockEntry {
    pub fn into_entry(self, entry_no: i64) -> StockEntry {
        StockEntry {
            id: self.id,
            entry_no,
            company_id: self.company_id,
            product_id: self.product_id,
            godown_id: self.godown_id,
            batch_id: self.batch_id,
            quantity: self.quantity,
            unit: self.unit,
            rate: self.rate,
            value: self.value,
            movement_kind: self.movement_kind,
            reference: self.reference,
            narration: self.narration,
            entry_date: self.entry_date,
            created_by: self.created_by,
        }
    }
}

/// Value of a movement: |quantity| x rate. `None` when out of range.
pub fn movement_value(quantity: Decimal, rate: Decimal) -> Option<Decimal> {
    quantity.abs().checked_mul(rate)
}

/// Sum of decimals, `None` on overflow
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |total, value| total.checked_add(value))
}
