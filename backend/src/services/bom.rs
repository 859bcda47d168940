//! Bill of materials registry and expansion

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    expand_components, validate_positive_quantity, validate_waste_percent, BillOfMaterial,
    BillOfMaterialWithComponents, BomComponent, ComponentRequirement,
};
use uuid::Uuid;
use validator::Validate;

use super::catalog::require_product;
use crate::error::{AppError, AppResult};
use crate::store::{LedgerStore, LedgerTx};

/// BOM service
#[derive(Clone)]
pub struct BomService {
    store: Arc<dyn LedgerStore>,
}

/// One component line of a new BOM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomComponentInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Defaults to the component product's unit
    pub unit: Option<String>,
    pub waste_percent: Option<Decimal>,
}

/// Input for creating a BOM
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBomInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub finished_product_id: Uuid,
    pub output_quantity: Decimal,
    /// Defaults to the finished product's unit
    pub output_unit: Option<String>,
    #[validate(length(min = 1))]
    pub components: Vec<BomComponentInput>,
}

/// Component requirements for a requested output
#[derive(Debug, Clone, Serialize)]
pub struct BomExpansion {
    pub bom_id: Uuid,
    pub finished_product_id: Uuid,
    pub output_quantity: Decimal,
    pub output_unit: String,
    pub components: Vec<ComponentRequirement>,
}

/// Load a BOM and expand it for `output_quantity` within an open transaction.
///
/// Every component product must exist and be active.
pub(crate) async fn expand_in(
    tx: &mut dyn LedgerTx,
    company_id: Uuid,
    bom_id: Uuid,
    output_quantity: Decimal,
) -> AppResult<(BillOfMaterial, Vec<ComponentRequirement>)> {
    let bom = tx
        .get_bom(company_id, bom_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("BOM {}", bom_id)))?;
    if !bom.is_active {
        return Err(AppError::InvalidBom(format!("BOM {} is inactive", bom.name)));
    }
    require_active(tx, company_id, bom.finished_product_id, "Finished product").await?;

    let components = tx.list_bom_components(bom.id).await?;
    for component in &components {
        require_active(tx, company_id, component.product_id, "Component product").await?;
    }

    let requirements = expand_components(&bom, &components, output_quantity)?;
    Ok((bom, requirements))
}

async fn require_active(tx: &mut dyn LedgerTx, company_id: Uuid, product_id: Uuid, role: &str) -> AppResult<()> {
    let active = tx
        .get_product(company_id, product_id)
        .await?
        .map_or(false, |p| p.is_active);
    if !active {
        return Err(AppError::InvalidBom(format!(
            "{} {} is missing or inactive",
            role, product_id
        )));
    }
    Ok(())
}

impl BomService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Create a BOM with its components
    pub async fn create_bom(&self, company_id: Uuid, input: CreateBomInput) -> AppResult<BillOfMaterialWithComponents> {
        input.validate()?;
        validate_positive_quantity(input.output_quantity)
            .map_err(|m| AppError::validation("output_quantity", m))?;

        let mut tx = self.store.begin().await?;
        let finished = require_product(&mut *tx, company_id, input.finished_product_id).await?;

        let bom = BillOfMaterial {
            id: Uuid::new_v4(),
            company_id,
            name: input.name,
            finished_product_id: finished.id,
            output_quantity: input.output_quantity,
            output_unit: input.output_unit.unwrap_or_else(|| finished.unit.clone()),
            is_active: true,
            created_at: Utc::now(),
        };

        let mut components = Vec::with_capacity(input.components.len());
        for line in input.components {
            validate_positive_quantity(line.quantity)
                .map_err(|m| AppError::validation("components.quantity", m))?;
            let waste_percent = line.waste_percent.unwrap_or(Decimal::ZERO);
            validate_waste_percent(waste_percent)
                .map_err(|m| AppError::validation("components.waste_percent", m))?;
            if line.product_id == finished.id {
                return Err(AppError::validation(
                    "components.product_id",
                    "A BOM cannot consume its own finished product",
                ));
            }

            let product = require_product(&mut *tx, company_id, line.product_id).await?;
            components.push(BomComponent {
                id: Uuid::new_v4(),
                bom_id: bom.id,
                product_id: product.id,
                quantity: line.quantity,
                unit: line.unit.unwrap_or(product.unit),
                waste_percent,
            });
        }

        tx.insert_bom(&bom, &components).await?;
        tx.commit().await?;

        tracing::info!(bom_id = %bom.id, components = components.len(), "BOM created");
        Ok(BillOfMaterialWithComponents { bom, components })
    }

    pub async fn get_bom(&self, company_id: Uuid, bom_id: Uuid) -> AppResult<BillOfMaterialWithComponents> {
        let mut tx = self.store.begin().await?;
        let bom = tx
            .get_bom(company_id, bom_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("BOM {}", bom_id)))?;
        let components = tx.list_bom_components(bom.id).await?;
        tx.commit().await?;

        Ok(BillOfMaterialWithComponents { bom, components })
    }

    pub async fn list_boms(&self, company_id: Uuid) -> AppResult<Vec<BillOfMaterial>> {
        let mut tx = self.store.begin().await?;
        let boms = tx.list_boms(company_id).await?;
        tx.commit().await?;
        Ok(boms)
    }

    /// Activate or retire a BOM; inactive BOMs cannot be expanded
    pub async fn set_bom_active(&self, company_id: Uuid, bom_id: Uuid, is_active: bool) -> AppResult<BillOfMaterial> {
        let mut tx = self.store.begin().await?;
        let bom = tx
            .set_bom_active(company_id, bom_id, is_active)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("BOM {}", bom_id)))?;
        tx.commit().await?;

        tracing::info!(bom_id = %bom.id, is_active, "BOM status changed");
        Ok(bom)
    }

    /// Component quantities needed to produce `output_quantity`. Read-only.
    pub async fn expand_bom(&self, company_id: Uuid, bom_id: Uuid, output_quantity: Decimal) -> AppResult<BomExpansion> {
        let mut tx = self.store.begin().await?;
        let (bom, components) = expand_in(&mut *tx, company_id, bom_id, output_quantity).await?;
        tx.commit().await?;

        Ok(BomExpansion {
            bom_id: bom.id,
            finished_product_id: bom.finished_product_id,
            output_quantity,
            output_unit: bom.output_unit,
            components,
        })
    }
}
