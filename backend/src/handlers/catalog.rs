//! HTTP handlers for products, godowns and batches

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Batch, Godown, Product};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser, STOCK_READ, STOCK_WRITE};
use crate::services::catalog::{CreateBatchInput, CreateGodownInput, CreateProductInput, SetActiveInput};
use crate::services::CatalogService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchListQuery {
    pub product_id: Option<Uuid>,
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = CatalogService::new(state.store);
    let product = service.create_product(current_user.0.company_id, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// List products
pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = CatalogService::new(state.store);
    let products = service.list_products(current_user.0.company_id).await?;
    Ok(Json(products))
}

/// Get a product
pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = CatalogService::new(state.store);
    let product = service.get_product(current_user.0.company_id, product_id).await?;
    Ok(Json(product))
}

/// Activate or retire a product
pub async fn set_product_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<SetActiveInput>,
) -> AppResult<Json<Product>> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = CatalogService::new(state.store);
    let product = service
        .set_product_active(current_user.0.company_id, product_id, input.is_active)
        .await?;
    Ok(Json(product))
}

/// Create a godown
pub async fn create_godown(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateGodownInput>,
) -> AppResult<(StatusCode, Json<Godown>)> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = CatalogService::new(state.store);
    let godown = service.create_godown(current_user.0.company_id, input).await?;
    Ok((StatusCode::CREATED, Json(godown)))
}

/// List godowns
pub async fn list_godowns(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Godown>>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = CatalogService::new(state.store);
    let godowns = service.list_godowns(current_user.0.company_id).await?;
    Ok(Json(godowns))
}

/// Get a godown
pub async fn get_godown(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(godown_id): Path<Uuid>,
) -> AppResult<Json<Godown>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = CatalogService::new(state.store);
    let godown = service.get_godown(current_user.0.company_id, godown_id).await?;
    Ok(Json(godown))
}

/// Create a batch
pub async fn create_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<Batch>)> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = CatalogService::new(state.store);
    let batch = service.create_batch(current_user.0.company_id, input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// List batches, optionally of one product
pub async fn list_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<BatchListQuery>,
) -> AppResult<Json<Vec<Batch>>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = CatalogService::new(state.store);
    let batches = service
        .list_batches(current_user.0.company_id, query.product_id)
        .await?;
    Ok(Json(batches))
}
