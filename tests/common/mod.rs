#![allow(dead_code)]

use bigdecimal::BigDecimal;
use studio_billing::models::{
    DerivedInvoice, Expense, InvoiceType, PriorInvoice, Quote, QuoteItem, QuoteStatus, Section,
};

pub const PROJECT_ID: i64 = 10;

pub fn dec(s: &str) -> BigDecimal {
    s.parse().expect("valid decimal")
}

/// 报价 1150 (小计 1000，TPS 5% + TVQ 10%)，订金 50%
pub fn sample_quote() -> Quote {
    Quote {
        id: 1,
        project_id: PROJECT_ID,
        number: "D-ACME-001".to_string(),
        status: QuoteStatus::Accepted,
        subtotal: dec("1000.00"),
        total: dec("1150.00"),
        tps_rate: dec("0.05"),
        tvq_rate: dec("0.10"),
        deposit_percent: dec("50"),
        discounts: Vec::new(),
        sections: vec![Section {
            id: 1,
            title: "Design".to_string(),
            items: vec![
                QuoteItem::fixed(1, "Logo", dec("1"), dec("600.00")),
                QuoteItem::fixed(2, "Website", dec("1"), dec("400.00")),
            ],
        }],
    }
}

pub fn expense(id: i64, amount: &str) -> Expense {
    Expense {
        id,
        project_id: PROJECT_ID,
        description: format!("Expense #{}", id),
        amount: dec(amount),
        is_billable: true,
        is_billed: false,
        invoice_id: None,
    }
}

/// 不带费用的已开发票：全额计入余额，纯费用发票不计入
pub fn prior_invoice(invoice_type: InvoiceType, total: &str) -> PriorInvoice {
    let balance_amount = if invoice_type.counts_against_quote() {
        dec(total)
    } else {
        BigDecimal::from(0)
    };
    PriorInvoice {
        invoice_type,
        total: dec(total),
        balance_amount,
    }
}

/// 把推导结果当作已持久化的发票
pub fn issued(derived: &DerivedInvoice) -> PriorInvoice {
    PriorInvoice {
        invoice_type: derived.invoice_type,
        total: derived.total.clone(),
        balance_amount: derived.balance_amount.clone(),
    }
}

pub fn lines_total(derived: &DerivedInvoice) -> BigDecimal {
    derived
        .items
        .iter()
        .fold(BigDecimal::from(0), |acc, line| acc + line.total.clone())
}

pub fn assert_close(actual: &BigDecimal, expected: &BigDecimal, tolerance: &str) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= dec(tolerance),
        "expected {} ≈ {} (±{}), diff {}",
        actual,
        expected,
        tolerance,
        diff
    );
}
