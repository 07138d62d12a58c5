//! 报价开票台账：按开票顺序列出发票及每张之后的剩余余额

use crate::error::{BillingError, BillingResult};
use crate::models::{Invoice, InvoiceStatus, LedgerRow, Quote};
use crate::service::pricing::round_cents;

/// 构建台账 (已取消的发票不计入)
pub fn ledger(quote: &Quote, invoices: &[Invoice]) -> Vec<LedgerRow> {
    let mut ordered: Vec<&Invoice> = invoices
        .iter()
        .filter(|inv| inv.status != InvoiceStatus::Cancelled)
        .collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut remaining = quote.total.clone();
    ordered
        .into_iter()
        .map(|inv| {
            remaining -= &inv.balance_amount;
            LedgerRow {
                invoice_number: inv.number.clone(),
                invoice_type: inv.invoice_type,
                status: inv.status.as_str().to_string(),
                issued_at: inv.created_at.format("%Y-%m-%d").to_string(),
                total: inv.total.clone(),
                amount_paid: inv.amount_paid.clone(),
                remaining_balance: round_cents(&remaining),
            }
        })
        .collect()
}

/// 导出台账为 CSV
pub fn write_ledger_csv(rows: &[LedgerRow]) -> BillingResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "invoice_number",
        "invoice_type",
        "status",
        "issued_at",
        "total",
        "amount_paid",
        "remaining_balance",
    ])?;

    for row in rows {
        writer.write_record(&[
            row.invoice_number.clone(),
            row.invoice_type.as_str().to_string(),
            row.status.clone(),
            row.issued_at.clone(),
            row.total.to_string(),
            row.amount_paid.to_string(),
            row.remaining_balance.to_string(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| BillingError::Export(csv::Error::from(e.into_error())))
}
