//! 报价 → 发票推导
//!
//! 纯计算：输入报价、已开发票和请求，输出待持久化的发票。
//! 读取和写入由 `BillingService` 在同一事务中完成。

use crate::error::{BillingError, BillingResult};
use crate::models::{
    BillingSummary, DerivedInvoice, InvoiceLine, InvoiceRequest, InvoiceType, PriorInvoice,
    Quote, QuoteStatus, RequestedInvoiceType,
};
use crate::service::pricing::{
    balance_tolerance, counts_toward_total, round_cents, zero_base_threshold,
};
use bigdecimal::{BigDecimal, One, Zero};
use indexmap::IndexSet;
use std::collections::HashSet;

/// 已开票总额 (只统计计入报价余额的部分)
pub fn total_invoiced(prior: &[PriorInvoice]) -> BigDecimal {
    prior
        .iter()
        .fold(BigDecimal::zero(), |acc, p| &acc + &p.balance_amount)
}

/// 剩余余额 = 报价总额 - 已开票总额
pub fn remaining_balance(quote: &Quote, prior: &[PriorInvoice]) -> BigDecimal {
    &quote.total - &total_invoiced(prior)
}

/// 订金的含税金额
pub fn deposit_gross(quote: &Quote) -> BigDecimal {
    &(&quote.total * &quote.deposit_percent) / &BigDecimal::from(100)
}

/// 决定发票的实际类型
///
/// 非订金请求由余额是否耗尽决定 FINAL 还是 PARTIAL。
pub fn resolve_invoice_type(
    requested: RequestedInvoiceType,
    remaining_balance: &BigDecimal,
    base_subtotal: &BigDecimal,
    base_total: &BigDecimal,
    expenses_total: &BigDecimal,
) -> InvoiceType {
    let tolerance = balance_tolerance();

    if *remaining_balance < tolerance
        && *expenses_total > BigDecimal::zero()
        && *base_subtotal < zero_base_threshold()
    {
        return InvoiceType::Standalone;
    }

    if requested == RequestedInvoiceType::Deposit {
        return InvoiceType::Deposit;
    }

    let new_remaining = remaining_balance - base_total;
    if new_remaining < tolerance {
        InvoiceType::Final
    } else {
        InvoiceType::Partial
    }
}

/// 推导新发票
pub fn derive_invoice(
    quote: &Quote,
    prior: &[PriorInvoice],
    request: &InvoiceRequest,
) -> BillingResult<DerivedInvoice> {
    if quote.status != QuoteStatus::Accepted {
        return Err(BillingError::InvalidState(format!(
            "only an accepted quote may be invoiced (quote {} is {})",
            quote.number, quote.status
        )));
    }

    let is_deposit = request.requested_type == RequestedInvoiceType::Deposit;
    if is_deposit && prior.iter().any(|p| p.invoice_type == InvoiceType::Deposit) {
        return Err(BillingError::DuplicateDeposit { quote_id: quote.id });
    }

    if is_deposit && quote.deposit_percent <= BigDecimal::zero() {
        return Err(BillingError::InvalidAmount(format!(
            "quote {} has no deposit percentage",
            quote.number
        )));
    }
    if let (false, Some(amount)) = (is_deposit, &request.requested_amount) {
        if *amount <= BigDecimal::zero() {
            return Err(BillingError::InvalidAmount(format!(
                "requested amount must be positive, got {}",
                amount
            )));
        }
    }

    let mut seen = HashSet::new();
    for expense in &request.expenses {
        if expense.amount <= BigDecimal::zero() {
            return Err(BillingError::InvalidAmount(format!(
                "expense {} must have a positive amount, got {}",
                expense.id, expense.amount
            )));
        }
        if !expense.is_available_for(quote.project_id) || !seen.insert(expense.id) {
            return Err(BillingError::ExpenseUnavailable(expense.id));
        }
    }

    let remaining = remaining_balance(quote, prior);
    let multiplier = quote.tax_multiplier();

    // 含税基数 (不含费用)
    let gross = if is_deposit {
        deposit_gross(quote)
    } else {
        match &request.requested_amount {
            Some(amount) => amount.clone(),
            None if remaining > BigDecimal::zero() => remaining.clone(),
            None => BigDecimal::zero(),
        }
    };

    if gross > &remaining + &balance_tolerance() {
        return Err(BillingError::AmountExceedsBalance {
            requested: round_cents(&gross),
            remaining: round_cents(&remaining),
        });
    }

    let base_subtotal = &gross / &multiplier;
    let base_total = &base_subtotal * &multiplier;
    let expenses_total = request
        .expenses
        .iter()
        .fold(BigDecimal::zero(), |acc, e| &acc + &e.amount);

    let invoice_type = resolve_invoice_type(
        request.requested_type,
        &remaining,
        &base_subtotal,
        &base_total,
        &expenses_total,
    );

    if invoice_type != InvoiceType::Standalone
        && request.expenses.is_empty()
        && base_subtotal < zero_base_threshold()
    {
        return Err(BillingError::InvalidState(format!(
            "quote {} is already fully invoiced",
            quote.number
        )));
    }

    // 持久化金额按分取整；类型判断使用未取整的值
    let expense_taxes = &round_cents(&(&expenses_total * &quote.tps_rate))
        + &round_cents(&(&expenses_total * &quote.tvq_rate));

    // FINAL 的含税部分固定为剩余余额，已开票总额与报价总额逐分一致
    let closing = (invoice_type == InvoiceType::Final).then(|| round_cents(&remaining));

    let base_rounded = match (&closing, invoice_type) {
        (_, InvoiceType::Standalone) => BigDecimal::zero(),
        (Some(closing), _) => round_cents(&(closing / &multiplier)),
        (None, _) => round_cents(&base_subtotal),
    };
    let subtotal = &base_rounded + &expenses_total;
    let tps_amount = round_cents(&(&subtotal * &quote.tps_rate));

    let (tvq_amount, total, balance_amount) = match closing {
        // TVQ 吸收分位差额
        Some(closing) => {
            let total = &(&closing + &expenses_total) + &expense_taxes;
            let tvq_amount = &(&total - &subtotal) - &tps_amount;
            (tvq_amount, total, closing)
        }
        None => {
            let tvq_amount = round_cents(&(&subtotal * &quote.tvq_rate));
            let total = &(&subtotal + &tps_amount) + &tvq_amount;
            let balance_amount = if !invoice_type.counts_against_quote() {
                BigDecimal::zero()
            } else if expenses_total.is_zero() {
                total.clone()
            } else {
                &total - &(&expenses_total + &expense_taxes)
            };
            (tvq_amount, total, balance_amount)
        }
    };

    let mut items = Vec::with_capacity(request.expenses.len() + 1);
    match invoice_type {
        InvoiceType::Deposit => items.push(single_line(
            format!(
                "Deposit ({}%) — Quote {}",
                format_percent(&quote.deposit_percent),
                quote.number
            ),
            &base_rounded,
        )),
        InvoiceType::Partial | InvoiceType::Final => {
            items.push(single_line(payment_description(quote, invoice_type), &base_rounded))
        }
        InvoiceType::Standalone => {}
    }
    items.extend(
        request
            .expenses
            .iter()
            .map(|e| single_line(e.description.clone(), &e.amount)),
    );

    tracing::debug!(
        "Quote {}: derived {} invoice, base {} + expenses {}, total {}",
        quote.number,
        invoice_type,
        base_rounded,
        expenses_total,
        total
    );

    Ok(DerivedInvoice {
        invoice_type,
        subtotal,
        tps_amount,
        tvq_amount,
        total,
        balance_amount,
        items,
        expense_ids: request.expenses.iter().map(|e| e.id).collect(),
    })
}

/// 报价开票进度
pub fn billing_summary(quote: &Quote, prior: &[PriorInvoice]) -> BillingSummary {
    let invoiced = total_invoiced(prior);
    let remaining = &quote.total - &invoiced;

    BillingSummary {
        quote_id: quote.id,
        quote_total: round_cents(&quote.total),
        total_invoiced: round_cents(&invoiced),
        fully_invoiced: remaining < balance_tolerance(),
        remaining_balance: round_cents(&remaining),
        has_deposit: prior.iter().any(|p| p.invoice_type == InvoiceType::Deposit),
        deposit_amount: round_cents(&deposit_gross(quote)),
    }
}

fn single_line(description: String, amount: &BigDecimal) -> InvoiceLine {
    InvoiceLine {
        description,
        quantity: BigDecimal::one(),
        unit_price: amount.clone(),
        total: amount.clone(),
    }
}

/// 汇总行：引用报价并列出计入总额的项目标题
fn payment_description(quote: &Quote, invoice_type: InvoiceType) -> String {
    let label = match invoice_type {
        InvoiceType::Final => "Final payment",
        _ => "Partial payment",
    };
    let titles: IndexSet<&str> = quote
        .items()
        .filter(|item| counts_toward_total(item))
        .map(|item| item.title.as_str())
        .collect();

    if titles.is_empty() {
        format!("{} — Quote {}", label, quote.number)
    } else {
        let joined: Vec<&str> = titles.into_iter().collect();
        format!("{} — Quote {}: {}", label, quote.number, joined.join(", "))
    }
}

/// 50.00 → "50"，33.33 → "33.33"
fn format_percent(value: &BigDecimal) -> String {
    let whole = value.with_scale(0);
    if whole == *value {
        whole.to_string()
    } else {
        value.to_string()
    }
}
