//! Validation utilities for the stock ledger

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::JournalType;

// ============================================================================
// Quantity and Rate Validations
// ============================================================================

/// Validate that a movement or line quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate that a rate is not negative
pub fn validate_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO {
        return Err("Rate cannot be negative");
    }
    Ok(())
}

/// Validate a BOM waste allowance (0% or more; above 100% is allowed)
pub fn validate_waste_percent(waste: Decimal) -> Result<(), &'static str> {
    if waste < Decimal::ZERO {
        return Err("Waste percentage cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Catalog Validations
// ============================================================================

/// Validate SKU format (1-40 chars, alphanumeric plus `-`, `_`, `.`, `/`)
pub fn validate_sku(sku: &str) -> Result<(), &'static str> {
    if sku.is_empty() {
        return Err("SKU is required");
    }
    if sku.len() > 40 {
        return Err("SKU must be at most 40 characters");
    }
    if !sku
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err("SKU may only contain letters, digits, '-', '_', '.' and '/'");
    }
    Ok(())
}

/// Validate batch manufacture/expiry dates
pub fn validate_batch_dates(
    manufacture_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
) -> Result<(), &'static str> {
    if let (Some(mfg), Some(exp)) = (manufacture_date, expiry_date) {
        if exp < mfg {
            return Err("Expiry date cannot be before manufacture date");
        }
    }
    Ok(())
}

// ============================================================================
// Voucher Validations
// ============================================================================

/// Validate a voucher number of the given journal type (e.g., "ST-2024-0007")
pub fn validate_voucher_number(voucher: &str, journal_type: JournalType) -> Result<(), &'static str> {
    let parts: Vec<&str> = voucher.split('-').collect();

    if parts.len() != 3 {
        return Err("Voucher number must be in format PREFIX-YYYY-NNNN");
    }

    if parts[0] != journal_type.prefix() {
        return Err("Voucher prefix does not match journal type");
    }

    if parts[1].len() != 4 || !parts[1].chars().all(|c| c.is_ascii_digit()) {
        return Err("Invalid year in voucher number");
    }

    if parts[2].len() < 4 || !parts[2].chars().all(|c| c.is_ascii_digit()) {
        return Err("Invalid sequence in voucher number");
    }

    Ok(())
}
