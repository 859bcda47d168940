//! Stock journal (voucher) models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{checked_sum, MovementKind};

/// Kind of business transaction a stock journal records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalType {
    Transfer,
    Manufacturing,
    Disassembly,
    Repackaging,
    Conversion,
    Adjustment,
}

impl JournalType {
    pub const ALL: [JournalType; 6] = [
        JournalType::Transfer,
        JournalType::Manufacturing,
        JournalType::Disassembly,
        JournalType::Repackaging,
        JournalType::Conversion,
        JournalType::Adjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JournalType::Transfer => "transfer",
            JournalType::Manufacturing => "manufacturing",
            JournalType::Disassembly => "disassembly",
            JournalType::Repackaging => "repackaging",
            JournalType::Conversion => "conversion",
            JournalType::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        JournalType::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Voucher number prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            JournalType::Transfer => "ST",
            JournalType::Manufacturing => "MFG",
            JournalType::Disassembly => "DIS",
            JournalType::Repackaging => "RPK",
            JournalType::Conversion => "CNV",
            JournalType::Adjustment => "ADJ",
        }
    }

    /// (outward kind for source lines, inward kind for destination lines)
    pub fn movement_kinds(&self) -> (MovementKind, MovementKind) {
        match self {
            JournalType::Transfer => (MovementKind::TransferOut, MovementKind::TransferIn),
            JournalType::Manufacturing => {
                (MovementKind::ManufacturingOut, MovementKind::ManufacturingIn)
            }
            JournalType::Disassembly => {
                (MovementKind::ManufacturingOut, MovementKind::ManufacturingIn)
            }
            JournalType::Repackaging => (MovementKind::RepackOut, MovementKind::RepackIn),
            JournalType::Conversion => (MovementKind::ConversionOut, MovementKind::ConversionIn),
            JournalType::Adjustment => (MovementKind::AdjustmentOut, MovementKind::AdjustmentIn),
        }
    }
}

impl std::fmt::Display for JournalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a stock journal
///
/// `draft -> confirmed -> cancelled` and `draft -> cancelled`. Cancelled is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalStatus {
    Draft,
    Confirmed,
    Cancelled,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Draft => "draft",
            JournalStatus::Confirmed => "confirmed",
            JournalStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(JournalStatus::Draft),
            "confirmed" => Some(JournalStatus::Confirmed),
            "cancelled" => Some(JournalStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the lifecycle permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: JournalStatus) -> bool {
        matches!(
            (self, next),
            (JournalStatus::Draft, JournalStatus::Confirmed)
                | (JournalStatus::Draft, JournalStatus::Cancelled)
                | (JournalStatus::Confirmed, JournalStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a journal a line sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSide {
    /// Consumed / outgoing
    Source,
    /// Produced / incoming
    Destination,
}

impl ItemSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemSide::Source => "source",
            ItemSide::Destination => "destination",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "source" => Some(ItemSide::Source),
            "destination" => Some(ItemSide::Destination),
            _ => None,
        }
    }
}

/// Stock journal voucher header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockJournal {
    pub id: Uuid,
    pub company_id: Uuid,
    pub voucher_number: String,
    pub voucher_seq: i32,
    pub fiscal_year: i32,
    pub journal_type: JournalType,
    pub status: JournalStatus,
    pub journal_date: NaiveDate,
    pub source_godown_id: Option<Uuid>,
    pub destination_godown_id: Option<Uuid>,
    pub bom_id: Option<Uuid>,
    pub narration: Option<String>,
    pub additional_cost: Decimal,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A voucher line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockJournalItem {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub side: ItemSide,
    pub line_no: i32,
    pub product_id: Uuid,
    pub godown_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit: String,
    pub rate: Decimal,
    pub value: Decimal,
    /// Lookup-only reference to the entry produced on confirmation
    pub stock_entry_id: Option<Uuid>,
    /// Lookup-only reference to the compensating entry written on cancellation
    pub reversal_entry_id: Option<Uuid>,
}

/// Journal header with its lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockJournalWithItems {
    #[serde(flatten)]
    pub journal: StockJournal,
    pub source_items: Vec<StockJournalItem>,
    pub destination_items: Vec<StockJournalItem>,
}

impl StockJournalWithItems {
    pub fn new(journal: StockJournal, items: Vec<StockJournalItem>) -> Self {
        let (source_items, destination_items): (Vec<_>, Vec<_>) =
            items.into_iter().partition(|i| i.side == ItemSide::Source);
        Self {
            journal,
            source_items,
            destination_items,
        }
    }

    pub fn line_count(&self) -> usize {
        self.source_items.len() + self.destination_items.len()
    }
}

/// Format a voucher number as `{PREFIX}-{year}-{seq:04}`
pub fn format_voucher_number(journal_type: JournalType, year: i32, sequence: i32) -> String {
    format!("{}-{}-{:04}", journal_type.prefix(), year, sequence)
}

/// Reference number used by compensating entries of a cancelled journal
pub fn reversal_reference_number(voucher_number: &str) -> String {
    format!("{}-REV", voucher_number)
}

/// Per-unit rate uplift for each destination line when an additional cost
/// is spread over them.
///
/// The cost is split by line value; when every line has zero value it is
/// split by quantity instead. Returned uplifts are rounded to 4 places.
/// `None` when the arithmetic leaves the decimal range.
pub fn allocate_additional_cost(lines: &[(Decimal, Decimal)], additional_cost: Decimal) -> Option<Vec<Decimal>> {
    if lines.is_empty() || additional_cost.is_zero() {
        return Some(vec![Decimal::ZERO; lines.len()]);
    }

    let total_value = checked_sum(lines.iter().map(|(_, value)| *value))?;
    let total_quantity = checked_sum(lines.iter().map(|(quantity, _)| *quantity))?;

    lines
        .iter()
        .map(|(quantity, value)| {
            if quantity.is_zero() {
                return Some(Decimal::ZERO);
            }
            let share = if total_value > Decimal::ZERO {
                additional_cost.checked_mul(*value)?.checked_div(total_value)?
            } else if total_quantity > Decimal::ZERO {
                additional_cost.checked_mul(*quantity)?.checked_div(total_quantity)?
            } else {
                Decimal::ZERO
            };
            Some(share.checked_div(*quantity)?.round_dp(4))
        })
        .collect()
}
