//! HTTP handlers for ledger reconstruction and stock reports

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{GodownStockSummary, LowStockRow, ReconciliationRow, StockLedger};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser, STOCK_READ};
use crate::services::ledger_report::{ExpiringBatch, LedgerQuery};
use crate::services::LedgerReportService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GodownSummaryQuery {
    pub godown_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    pub within_days: Option<u32>,
}

/// Stock card of one product
pub async fn stock_ledger(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<LedgerQuery>,
) -> AppResult<Json<StockLedger>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = LedgerReportService::new(state.store);
    let ledger = service.get_ledger(current_user.0.company_id, query).await?;
    Ok(Json(ledger))
}

/// Balances per godown and product
pub async fn godown_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<GodownSummaryQuery>,
) -> AppResult<Json<Vec<GodownStockSummary>>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = LedgerReportService::new(state.store);
    let summary = service
        .godown_summary(current_user.0.company_id, query.godown_id)
        .await?;
    Ok(Json(summary))
}

/// Cached stock vs ledger balance per product
pub async fn reconcile(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<ReconciliationRow>>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = LedgerReportService::new(state.store);
    let rows = service.reconcile(current_user.0.company_id).await?;
    Ok(Json(rows))
}

/// Products at or below their minimum level
pub async fn low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<LowStockRow>>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = LedgerReportService::new(state.store);
    let rows = service.low_stock(current_user.0.company_id).await?;
    Ok(Json(rows))
}

/// Batches expiring soon (default 30 days)
pub async fn expiring_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ExpiringQuery>,
) -> AppResult<Json<Vec<ExpiringBatch>>> {
    check_permission(&current_user.0, STOCK_READ)?;
    let service = LedgerReportService::new(state.store);
    let batches = service
        .expiring_batches(current_user.0.company_id, query.within_days.unwrap_or(30))
        .await?;
    Ok(Json(batches))
}
