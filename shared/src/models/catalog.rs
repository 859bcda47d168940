//! Catalog and location registry models: products, godowns, batches

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog item with a cached stock counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub company_id: Uuid,
    pub sku: String,
    pub name: String,
    pub unit: String,
    /// Materialized view of the movement ledger; never written directly
    pub current_stock: Decimal,
    /// Stock carried in before the first ledger entry
    pub opening_stock: Decimal,
    pub min_stock_level: Decimal,
    pub standard_cost: Decimal,
    pub track_batches: bool,
    pub track_expiry: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A warehouse / storage location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Godown {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub parent_id: Option<Uuid>,
    /// At most one default godown per company
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A sub-partition of a product's stock with its own dates and quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub company_id: Uuid,
    pub product_id: Uuid,
    pub batch_number: String,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    /// Whether the batch expires on or before the given date
    pub fn expires_by(&self, date: NaiveDate) -> bool {
        matches!(self.expiry_date, Some(expiry) if expiry <= date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(expiry: Option<NaiveDate>) -> Batch {
        Batch {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            batch_number: "B-001".to_string(),
            manufacture_date: None,
            expiry_date: expiry,
            quantity: Decimal::from(10),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_expires_by() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert!(batch(Some(date)).expires_by(date));
        assert!(batch(NaiveDate::from_ymd_opt(2024, 6, 1)).expires_by(date));
        assert!(!batch(NaiveDate::from_ymd_opt(2024, 7, 1)).expires_by(date));
        assert!(!batch(None).expires_by(date));
    }
}
