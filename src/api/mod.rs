pub mod handlers;

pub use handlers::*;

use crate::service::BillingService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

/// 构建路由
pub fn router(service: Arc<BillingService>) -> Router {
    let quote_routes = Router::new()
        .route("/api/quotes/:id/invoices", post(create_invoice))
        .route("/api/quotes/:id/billing", get(billing_summary))
        .route("/api/quotes/:id/preview", get(quote_preview))
        .route("/api/quotes/:id/ledger.csv", get(quote_ledger))
        .route("/api/quotes/:id/approve", post(approve_quote));

    let invoice_routes = Router::new()
        .route("/api/invoices/:id/status", post(change_invoice_status))
        .route("/api/invoices/:id/payments", post(record_payment))
        .route("/api/invoices/:id/cancel", post(cancel_invoice))
        .route("/api/invoices/overdue-sweep", post(overdue_sweep));

    Router::new()
        .route("/health", get(health_check))
        .merge(quote_routes)
        .merge(invoice_routes)
        .with_state(service)
        .layer(ServiceBuilder::new())
}
