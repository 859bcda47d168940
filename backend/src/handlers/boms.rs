//! HTTP handlers for bills of material

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{BillOfMaterial, BillOfMaterialWithComponents};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser, STOCK_READ, STOCK_WRITE};
use crate::services::bom::{BomExpansion, CreateBomInput};
use crate::services::catalog::SetActiveInput;
use crate::services::BomService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExpandQuery {
    pub output_quantity: Decimal,
}

/// Create a BOM
pub async fn create_bom(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBomInput>,
) -> AppResult<(StatusCode, Json<BillOfMaterialWithComponents>)> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = BomService::new(state.store);
    let bom = service.create_bom(current_user.0.company_id, input).await?;
    Ok((StatusCode::CREATED, Json(bom)))
}

/// List BOMs
pub async fn list_boms(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<BillOfMaterial>>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = BomService::new(state.store);
    let boms = service.list_boms(current_user.0.company_id).await?;
    Ok(Json(boms))
}

/// Get a BOM with its components
pub async fn get_bom(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bom_id): Path<Uuid>,
) -> AppResult<Json<BillOfMaterialWithComponents>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = BomService::new(state.store);
    let bom = service.get_bom(current_user.0.company_id, bom_id).await?;
    Ok(Json(bom))
}

/// Activate or retire a BOM
pub async fn set_bom_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bom_id): Path<Uuid>,
    Json(input): Json<SetActiveInput>,
) -> AppResult<Json<BillOfMaterial>> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = BomService::new(state.store);
    let bom = service
        .set_bom_active(current_user.0.company_id, bom_id, input.is_active)
        .await?;
    Ok(Json(bom))
}

/// Expand a BOM for a requested output quantity
pub async fn expand_bom(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bom_id): Path<Uuid>,
    Query(query): Query<ExpandQuery>,
) -> AppResult<Json<BomExpansion>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = BomService::new(state.store);
    let expansion = service
        .expand_bom(current_user.0.company_id, bom_id, query.output_quantity)
        .await?;
    Ok(Json(expansion))
}
