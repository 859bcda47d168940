//! Catalog and location registry: products, godowns and batches

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{
    validate_batch_dates, validate_rate, validate_sku, Batch, Godown, Product,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx};

/// Catalog service for products, godowns and batches
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LedgerStore>,
}

/// Input for creating a product
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    pub sku: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub unit: String,
    pub opening_stock: Option<Decimal>,
    pub min_stock_level: Option<Decimal>,
    pub standard_cost: Option<Decimal>,
    pub track_batches: Option<bool>,
    pub track_expiry: Option<bool>,
}

/// Input for creating a godown
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGodownInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 40))]
    pub code: Option<String>,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub is_default: bool,
}

/// Input for creating a batch
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBatchInput {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub batch_number: String,
    pub manufacture_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// Active flag change for a product or BOM
#[derive(Debug, Clone, Deserialize)]
pub struct SetActiveInput {
    pub is_active: bool,
}

// ============================================================================
// Lookups shared by the other services
// ============================================================================

/// Product of the company, or `NotFound`
pub(crate) async fn require_product(
    tx: &mut dyn LedgerTx,
    company_id: Uuid,
    product_id: Uuid,
) -> AppResult<Product> {
    tx.get_product(company_id, product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
}

/// Active godown of the company, or `NotFound`
pub(crate) async fn require_godown(
    tx: &mut dyn LedgerTx,
    company_id: Uuid,
    godown_id: Uuid,
) -> AppResult<Godown> {
    tx.get_godown(company_id, godown_id)
        .await?
        .filter(|g| g.is_active)
        .ok_or_else(|| AppError::NotFound(format!("Godown {}", godown_id)))
}

/// Batch of the company that belongs to `product_id`
pub(crate) async fn require_batch(
    tx: &mut dyn LedgerTx,
    company_id: Uuid,
    product_id: Uuid,
    batch_id: Uuid,
) -> AppResult<Batch> {
    let batch = tx
        .get_batch(company_id, batch_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))?;

    if batch.product_id != product_id {
        return Err(AppError::validation(
            "batch_id",
            format!("Batch {} does not belong to product {}", batch.batch_number, product_id),
        ));
    }

    Ok(batch)
}

impl CatalogService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Products
    // ========================================================================

    /// Register a product; its cached stock starts at the opening stock
    pub async fn create_product(&self, company_id: Uuid, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        validate_sku(&input.sku).map_err(|m| AppError::validation("sku", m))?;

        let opening_stock = input.opening_stock.unwrap_or(Decimal::ZERO);
        if opening_stock < Decimal::ZERO {
            return Err(AppError::validation("opening_stock", "Opening stock cannot be negative"));
        }
        let min_stock_level = input.min_stock_level.unwrap_or(Decimal::ZERO);
        if min_stock_level < Decimal::ZERO {
            return Err(AppError::validation("min_stock_level", "Minimum stock level cannot be negative"));
        }
        let standard_cost = input.standard_cost.unwrap_or(Decimal::ZERO);
        validate_rate(standard_cost).map_err(|m| AppError::validation("standard_cost", m))?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            company_id,
            sku: input.sku,
            name: input.name,
            unit: input.unit,
            current_stock: opening_stock,
            opening_stock,
            min_stock_level,
            standard_cost,
            track_batches: input.track_batches.unwrap_or(false),
            track_expiry: input.track_expiry.unwrap_or(false),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.store.begin().await?;
        tx.insert_product(&product).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    pub async fn get_product(&self, company_id: Uuid, product_id: Uuid) -> AppResult<Product> {
        let mut tx = self.store.begin().await?;
        let product = require_product(&mut *tx, company_id, product_id).await?;
        tx.commit().await?;
        Ok(product)
    }

    pub async fn list_products(&self, company_id: Uuid) -> AppResult<Vec<Product>> {
        let mut tx = self.store.begin().await?;
        let products = tx.list_products(company_id).await?;
        tx.commit().await?;
        Ok(products)
    }

    /// Activate or retire a product. Inactive products keep their ledger
    /// history but cannot take new movements, journal lines or BOM use.
    pub async fn set_product_active(&self, company_id: Uuid, product_id: Uuid, is_active: bool) -> AppResult<Product> {
        let mut tx = self.store.begin().await?;
        let product = tx
            .set_product_active(company_id, product_id, is_active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;
        tx.commit().await?;

        tracing::info!(product_id = %product.id, is_active, "Product status changed");
        Ok(product)
    }

    // ========================================================================
    // Godowns
    // ========================================================================

    /// Register a godown. Marking it default clears the previous default.
    pub async fn create_godown(&self, company_id: Uuid, input: CreateGodownInput) -> AppResult<Godown> {
        input.validate()?;

        let mut tx = self.store.begin().await?;

        if let Some(parent_id) = input.parent_id {
            tx.get_godown(company_id, parent_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Godown {}", parent_id)))?;
        }

        if input.is_default {
            tx.clear_default_godown(company_id).await?;
        }

        let godown = Godown {
            id: Uuid::new_v4(),
            company_id,
            name: input.name,
            code: input.code,
            parent_id: input.parent_id,
            is_default: input.is_default,
            is_active: true,
            created_at: Utc::now(),
        };
        tx.insert_godown(&godown).await?;
        tx.commit().await?;

        tracing::info!(godown_id = %godown.id, is_default = godown.is_default, "Godown created");
        Ok(godown)
    }

    pub async fn get_godown(&self, company_id: Uuid, godown_id: Uuid) -> AppResult<Godown> {
        let mut tx = self.store.begin().await?;
        let godown = tx
            .get_godown(company_id, godown_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Godown {}", godown_id)))?;
        tx.commit().await?;
        Ok(godown)
    }

    pub async fn list_godowns(&self, company_id: Uuid) -> AppResult<Vec<Godown>> {
        let mut tx = self.store.begin().await?;
        let godowns = tx.list_godowns(company_id).await?;
        tx.commit().await?;
        Ok(godowns)
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Register a batch with zero quantity; movements fill it
    pub async fn create_batch(&self, company_id: Uuid, input: CreateBatchInput) -> AppResult<Batch> {
        input.validate()?;
        validate_batch_dates(input.manufacture_date, input.expiry_date)
            .map_err(|m| AppError::validation("expiry_date", m))?;

        let mut tx = self.store.begin().await?;
        let product = require_product(&mut *tx, company_id, input.product_id).await?;

        if !product.track_batches {
            return Err(AppError::validation(
                "product_id",
                format!("Product {} does not track batches", product.sku),
            ));
        }
        if product.track_expiry && input.expiry_date.is_none() {
            return Err(AppError::validation(
                "expiry_date",
                format!("Product {} requires an expiry date", product.sku),
            ));
        }

        let batch = Batch {
            id: Uuid::new_v4(),
            company_id,
            product_id: product.id,
            batch_number: input.batch_number,
            manufacture_date: input.manufacture_date,
            expiry_date: input.expiry_date,
            quantity: Decimal::ZERO,
            created_at: Utc::now(),
        };
        tx.insert_batch(&batch).await?;
        tx.commit().await?;

        tracing::info!(batch_id = %batch.id, product_id = %batch.product_id, "Batch created");
        Ok(batch)
    }

    pub async fn list_batches(&self, company_id: Uuid, product_id: Option<Uuid>) -> AppResult<Vec<Batch>> {
        let mut tx = self.store.begin().await?;
        let batches = tx.list_batches(company_id, product_id).await?;
        tx.commit().await?;
        Ok(batches)
    }
}
