use crate::error::BillingError;
use crate::models::{BillingSummary, Invoice, InvoiceStatus, RequestedInvoiceType};
use crate::service::{BillingService, QuotePreview, QuoteTotals};
use axum::{
    extract::{Json, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// 请求体: 从报价开票
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub invoice_type: RequestedInvoiceType,
    /// 含税金额，为空时开具全部剩余余额
    pub amount: Option<BigDecimal>,
    #[serde(default)]
    pub expense_ids: Vec<i64>,
}

/// 请求体: 客户批准报价
#[derive(Debug, Default, Deserialize)]
pub struct ApproveQuoteRequest {
    #[serde(default)]
    pub item_selections: HashMap<i64, bool>,
    #[serde(default)]
    pub variant_selections: HashMap<i64, usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: InvoiceStatus,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: BigDecimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub release_number: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverdueSweepRequest {
    /// 默认今天
    pub today: Option<NaiveDate>,
}

/// 响应体
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_balance: Option<BigDecimal>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(message: String, data: T) -> Response {
        let body = ApiResponse {
            success: true,
            message,
            data: Some(data),
            remaining_balance: None,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        let status = match &self {
            BillingError::NotFound(_) => StatusCode::NOT_FOUND,
            BillingError::InvalidState(_)
            | BillingError::DuplicateDeposit { .. }
            | BillingError::ExpenseUnavailable(_) => StatusCode::CONFLICT,
            BillingError::AmountExceedsBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BillingError::InvalidAmount(_) | BillingError::InvalidSelection(_) => {
                StatusCode::BAD_REQUEST
            }
            BillingError::InvalidData(_)
            | BillingError::Export(_)
            | BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let remaining_balance = match &self {
            BillingError::AmountExceedsBalance { remaining, .. } => Some(remaining.clone()),
            _ => None,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "Error: internal error".to_string()
        } else {
            format!("Error: {}", self)
        };

        let body: ApiResponse<()> = ApiResponse {
            success: false,
            message,
            data: None,
            remaining_balance,
        };
        (status, Json(body)).into_response()
    }
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 从报价开票
pub async fn create_invoice(
    State(service): State<Arc<BillingService>>,
    Path(quote_id): Path<i64>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<Response, BillingError> {
    let invoice: Invoice = service
        .create_invoice_from_quote(quote_id, req.invoice_type, req.amount, &req.expense_ids)
        .await?;
    let message = format!("Created {} invoice {}", invoice.invoice_type, invoice.number);
    Ok(ApiResponse::ok(message, invoice))
}

/// 报价开票进度
pub async fn billing_summary(
    State(service): State<Arc<BillingService>>,
    Path(quote_id): Path<i64>,
) -> Result<Response, BillingError> {
    let summary: BillingSummary = service.billing_summary(quote_id).await?;
    Ok(ApiResponse::ok(format!("Quote {} billing summary", quote_id), summary))
}

/// 报价预览
pub async fn quote_preview(
    State(service): State<Arc<BillingService>>,
    Path(quote_id): Path<i64>,
) -> Result<Response, BillingError> {
    let preview: QuotePreview = service.quote_preview(quote_id).await?;
    Ok(ApiResponse::ok(format!("Quote {} preview", preview.number), preview))
}

/// 开票台账 CSV
pub async fn quote_ledger(
    State(service): State<Arc<BillingService>>,
    Path(quote_id): Path<i64>,
) -> Result<Response, BillingError> {
    let csv = service.quote_ledger_csv(quote_id).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        csv,
    )
        .into_response())
}

/// 客户批准报价
pub async fn approve_quote(
    State(service): State<Arc<BillingService>>,
    Path(quote_id): Path<i64>,
    Json(req): Json<ApproveQuoteRequest>,
) -> Result<Response, BillingError> {
    let totals: QuoteTotals = service
        .approve_quote(quote_id, &req.item_selections, &req.variant_selections)
        .await?;
    Ok(ApiResponse::ok(format!("Quote {} accepted", quote_id), totals.rounded()))
}

/// 发票状态流转
pub async fn change_invoice_status(
    State(service): State<Arc<BillingService>>,
    Path(invoice_id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> Result<Response, BillingError> {
    let invoice = service.change_invoice_status(invoice_id, req.status).await?;
    let message = format!("Invoice {} is now {}", invoice.number, invoice.status);
    Ok(ApiResponse::ok(message, invoice))
}

/// 登记付款
pub async fn record_payment(
    State(service): State<Arc<BillingService>>,
    Path(invoice_id): Path<i64>,
    Json(req): Json<PaymentRequest>,
) -> Result<Response, BillingError> {
    let invoice = service.record_payment(invoice_id, &req.amount).await?;
    let message = format!("Recorded payment of {} on invoice {}", req.amount, invoice.number);
    Ok(ApiResponse::ok(message, invoice))
}

/// 取消发票
pub async fn cancel_invoice(
    State(service): State<Arc<BillingService>>,
    Path(invoice_id): Path<i64>,
    Json(req): Json<CancelRequest>,
) -> Result<Response, BillingError> {
    let invoice = service.cancel_invoice(invoice_id, req.release_number).await?;
    Ok(ApiResponse::ok(format!("Invoice {} cancelled", invoice.number), invoice))
}

/// 逾期扫描
pub async fn overdue_sweep(
    State(service): State<Arc<BillingService>>,
    Json(req): Json<OverdueSweepRequest>,
) -> Result<Response, BillingError> {
    let today = req.today.unwrap_or_else(|| Utc::now().date_naive());
    let marked = service.mark_overdue(today).await?;
    Ok(ApiResponse::ok(format!("{} invoices marked overdue", marked), marked))
}
