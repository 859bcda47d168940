//! Route definitions for the stock ledger API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes
        .merge(protected_routes(state))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/products", product_routes())
        .nest("/godowns", godown_routes())
        .nest("/batches", batch_routes())
        .nest("/movements", movement_routes())
        .nest("/journals", journal_routes())
        .nest("/boms", bom_routes())
        .nest("/reports", report_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Product catalog routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/:product_id", get(handlers::get_product))
        .route("/:product_id/status", put(handlers::set_product_status))
}

/// Godown routes
fn godown_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_godowns).post(handlers::create_godown))
        .route("/:godown_id", get(handlers::get_godown))
}

/// Batch routes
fn batch_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_batches).post(handlers::create_batch))
}

/// Standalone ledger movements
fn movement_routes() -> Router<AppState> {
    Router::new()
        .route("/in", post(handlers::record_in))
        .route("/out", post(handlers::record_out))
        .route("/:entry_id", get(handlers::get_entry))
}

/// Stock journal routes
fn journal_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_journals).post(handlers::create_journal))
        .route(
            "/:journal_id",
            get(handlers::get_journal)
                .put(handlers::update_journal)
                .delete(handlers::delete_journal),
        )
        .route("/:journal_id/confirm", post(handlers::confirm_journal))
        .route("/:journal_id/cancel", post(handlers::cancel_journal))
        // Quick builders
        .route("/quick/transfer", post(handlers::quick_transfer))
        .route("/quick/conversion", post(handlers::quick_conversion))
        .route("/quick/adjustment", post(handlers::quick_adjustment))
        .route("/quick/bom-production", post(handlers::quick_bom_production))
}

/// Bill of material routes
fn bom_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_boms).post(handlers::create_bom))
        .route("/:bom_id", get(handlers::get_bom))
        .route("/:bom_id/status", put(handlers::set_bom_status))
        .route("/:bom_id/expand", get(handlers::expand_bom))
}

/// Ledger and stock report routes
fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/ledger", get(handlers::stock_ledger))
        .route("/godown-summary", get(handlers::godown_summary))
        .route("/reconciliation", get(handlers::reconcile))
        .route("/low-stock", get(handlers::low_stock))
        .route("/expiring-batches", get(handlers::expiring_batches))
}
