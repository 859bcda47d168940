//! HTTP handlers for stock journals and the quick builders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{StockJournal, StockJournalWithItems};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser, STOCK_CONFIRM, STOCK_READ, STOCK_WRITE};
use crate::services::quick_journal::{
    AdjustmentInput, BomProductionInput, ConversionInput, TransferInput,
};
use crate::services::stock_journal::{CreateJournalInput, ListJournalsQuery, UpdateJournalInput};
use crate::services::{QuickJournalService, StockJournalService};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CancelJournalRequest {
    #[validate(length(min = 1, max = 1000))]
    pub reason: String,
}

/// Create a draft journal
pub async fn create_journal(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateJournalInput>,
) -> AppResult<(StatusCode, Json<StockJournalWithItems>)> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = StockJournalService::new(state.store);
    let journal = service
        .create_journal(current_user.0.company_id, Some(current_user.0.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(journal)))
}

/// List journals
pub async fn list_journals(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListJournalsQuery>,
) -> AppResult<Json<Vec<StockJournal>>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = StockJournalService::new(state.store);
    let journals = service.list_journals(current_user.0.company_id, query).await?;
    Ok(Json(journals))
}

/// Get a journal with its lines
pub async fn get_journal(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(journal_id): Path<Uuid>,
) -> AppResult<Json<StockJournalWithItems>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = StockJournalService::new(state.store);
    let journal = service.get_journal(current_user.0.company_id, journal_id).await?;
    Ok(Json(journal))
}

/// Replace a draft's contents
pub async fn update_journal(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(journal_id): Path<Uuid>,
    Json(input): Json<UpdateJournalInput>,
) -> AppResult<Json<StockJournalWithItems>> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = StockJournalService::new(state.store);
    let journal = service
        .update_draft(current_user.0.company_id, journal_id, input)
        .await?;
    Ok(Json(journal))
}

/// Delete a draft
pub async fn delete_journal(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(journal_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    let service = StockJournalService::new(state.store);
    service.delete_journal(current_user.0.company_id, journal_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Confirm a draft
pub async fn confirm_journal(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(journal_id): Path<Uuid>,
) -> AppResult<Json<StockJournalWithItems>> {
    check_permission(&current_user.0, STOCK_CONFIRM)?;
    let service = StockJournalService::new(state.store);
    let journal = service
        .confirm_journal(current_user.0.company_id, Some(current_user.0.user_id), journal_id)
        .await?;
    Ok(Json(journal))
}

/// Cancel a journal
pub async fn cancel_journal(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(journal_id): Path<Uuid>,
    Json(input): Json<CancelJournalRequest>,
) -> AppResult<Json<StockJournalWithItems>> {
    check_permission(&current_user.0, STOCK_CONFIRM)?;
    input.validate()?;
    let service = StockJournalService::new(state.store);
    let journal = service
        .cancel_journal(
            current_user.0.company_id,
            Some(current_user.0.user_id),
            journal_id,
            &input.reason,
        )
        .await?;
    Ok(Json(journal))
}

/// Quick transfer between godowns
pub async fn quick_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TransferInput>,
) -> AppResult<(StatusCode, Json<StockJournalWithItems>)> {
    check_quick_permissions(&current_user, input.auto_confirm)?;
    let service = QuickJournalService::new(state.store);
    let journal = service
        .transfer(current_user.0.company_id, Some(current_user.0.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(journal)))
}

/// Quick product conversion
pub async fn quick_conversion(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ConversionInput>,
) -> AppResult<(StatusCode, Json<StockJournalWithItems>)> {
    check_quick_permissions(&current_user, input.auto_confirm)?;
    let service = QuickJournalService::new(state.store);
    let journal = service
        .conversion(current_user.0.company_id, Some(current_user.0.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(journal)))
}

/// Quick stock adjustment
pub async fn quick_adjustment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AdjustmentInput>,
) -> AppResult<(StatusCode, Json<StockJournalWithItems>)> {
    check_quick_permissions(&current_user, input.auto_confirm)?;
    let service = QuickJournalService::new(state.store);
    let journal = service
        .adjustment(current_user.0.company_id, Some(current_user.0.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(journal)))
}

/// Production from a BOM
pub async fn quick_bom_production(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BomProductionInput>,
) -> AppResult<(StatusCode, Json<StockJournalWithItems>)> {
    check_quick_permissions(&current_user, input.auto_confirm)?;
    let service = QuickJournalService::new(state.store);
    let journal = service
        .bom_production(current_user.0.company_id, Some(current_user.0.user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(journal)))
}

fn check_quick_permissions(current_user: &CurrentUser, auto_confirm: bool) -> AppResult<()> {
    check_permission(&current_user.0, STOCK_WRITE)?;
    if auto_confirm {
        check_permission(&current_user.0, STOCK_CONFIRM)?;
    }
    Ok(())
}
