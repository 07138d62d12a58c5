//! 发票生命周期：状态流转、登记付款、取消、逾期判断

use crate::error::{BillingError, BillingResult};
use crate::models::{Invoice, InvoiceStatus};
use crate::service::pricing::cents;
use bigdecimal::{BigDecimal, Zero};
use chrono::{Duration, NaiveDate};

pub fn transition(invoice: &mut Invoice, next: InvoiceStatus) -> BillingResult<()> {
    if !invoice.status.can_transition_to(next) {
        return Err(BillingError::InvalidState(format!(
            "invoice {} cannot move from {} to {}",
            invoice.number, invoice.status, next
        )));
    }
    invoice.status = next;
    Ok(())
}

/// 登记付款，付清 (差额小于一分) 时自动变为 PAID
pub fn record_payment(invoice: &mut Invoice, amount: &BigDecimal) -> BillingResult<()> {
    if !invoice.status.accepts_payment() {
        return Err(BillingError::InvalidState(format!(
            "invoice {} does not accept payments while {}",
            invoice.number, invoice.status
        )));
    }
    if *amount <= BigDecimal::zero() {
        return Err(BillingError::InvalidAmount(format!(
            "payment must be positive, got {}",
            amount
        )));
    }

    invoice.amount_paid += amount;
    if balance_due(invoice) <= cents(1) {
        invoice.status = InvoiceStatus::Paid;
    }
    Ok(())
}

/// 取消发票；`release_number` 允许编号被后续发票复用
pub fn cancel(invoice: &mut Invoice, release_number: bool) -> BillingResult<()> {
    transition(invoice, InvoiceStatus::Cancelled)?;
    invoice.is_number_reusable = release_number;
    Ok(())
}

pub fn is_overdue(invoice: &Invoice, today: NaiveDate) -> bool {
    invoice.status == InvoiceStatus::Sent && invoice.due_date.map_or(false, |due| due < today)
}

pub fn due_date(issued: NaiveDate, payment_terms_days: u32) -> NaiveDate {
    issued + Duration::days(i64::from(payment_terms_days))
}

pub fn balance_due(invoice: &Invoice) -> BigDecimal {
    &invoice.total - &invoice.amount_paid
}
