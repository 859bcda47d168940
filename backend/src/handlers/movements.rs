//! HTTP handlers for standalone ledger movements

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::StockEntry;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser, STOCK_READ, STOCK_WRITE};
use crate::services::movement::RecordMovementInput;
use crate::services::MovementService;
use crate::AppState;

/// Receive stock
pub async fn record_in(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordMovementInput>,
) -> AppResult<(StatusCode, Json<StockEntry>)> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = MovementService::new(state.store);
    let entry = service
        .record_in(current_user.0.company_id, Some(current_user.0.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Issue stock
pub async fn record_out(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordMovementInput>,
) -> AppResult<(StatusCode, Json<StockEntry>)> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = MovementService::new(state.store);
    let entry = service
        .record_out(current_user.0.company_id, Some(current_user.0.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Get one ledger entry
pub async fn get_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<StockEntry>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = MovementService::new(state.store);
    let entry = service.get_entry(current_user.0.company_id, entry_id).await?;
    Ok(Json(entry))
}
