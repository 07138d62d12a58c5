mod common;

use chrono::{TimeZone, Utc};
use common::{dec, prior_invoice, sample_quote};
use studio_billing::models::{Invoice, InvoiceStatus, InvoiceType};
use studio_billing::service::ledger::{ledger, write_ledger_csv};
use studio_billing::service::numbering::{allocate, Allocation, INVOICE_PREFIX};

fn invoice(id: i64, number: &str, invoice_type: InvoiceType, total: &str, day: u32) -> Invoice {
    let prior = prior_invoice(invoice_type, total);
    Invoice {
        id,
        project_id: common::PROJECT_ID,
        quote_id: Some(1),
        number: number.to_string(),
        invoice_type,
        status: InvoiceStatus::Sent,
        subtotal: dec("0"),
        tps_amount: dec("0"),
        tvq_amount: dec("0"),
        total: prior.total,
        balance_amount: prior.balance_amount,
        amount_paid: dec("0.00"),
        due_date: None,
        is_number_reusable: false,
        created_at: Utc.with_ymd_and_hms(2026, 2, day, 9, 0, 0).unwrap(),
        items: Vec::new(),
    }
}

#[test]
fn ledger_runs_remaining_balance_in_issue_order() {
    let quote = sample_quote();
    let mut cancelled = invoice(3, "F-ACME-003", InvoiceType::Partial, "100.00", 3);
    cancelled.status = InvoiceStatus::Cancelled;
    let invoices = vec![
        invoice(4, "F-ACME-004", InvoiceType::Standalone, "57.50", 5),
        invoice(2, "F-ACME-002", InvoiceType::Final, "575.00", 4),
        cancelled,
        invoice(1, "F-ACME-001", InvoiceType::Deposit, "575.00", 1),
    ];

    let rows = ledger(&quote, &invoices);

    let numbers: Vec<&str> = rows.iter().map(|r| r.invoice_number.as_str()).collect();
    assert_eq!(numbers, vec!["F-ACME-001", "F-ACME-002", "F-ACME-004"]);
    assert_eq!(rows[0].remaining_balance, dec("575.00"));
    assert_eq!(rows[1].remaining_balance, dec("0.00"));
    assert_eq!(rows[2].remaining_balance, dec("0.00"));
    assert_eq!(rows[0].issued_at, "2026-02-01");
}

#[test]
fn ledger_csv_has_header_and_rows() {
    let quote = sample_quote();
    let invoices = vec![invoice(1, "F-ACME-001", InvoiceType::Deposit, "575.00", 1)];

    let bytes = write_ledger_csv(&ledger(&quote, &invoices)).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(
        lines[0],
        "invoice_number,invoice_type,status,issued_at,total,amount_paid,remaining_balance"
    );
    assert_eq!(lines[1], "F-ACME-001,DEPOSIT,SENT,2026-02-01,575.00,0.00,575.00");
    assert_eq!(lines.len(), 2);
}

#[test]
fn cancelled_number_is_reused_before_a_fresh_one() {
    let used: Vec<String> = ["F-ACME-001", "F-ACME-002", "F-ACME-004"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let reusable = vec!["F-ACME-003".to_string()];

    assert_eq!(
        allocate(INVOICE_PREFIX, "ACME", &used, &reusable),
        Allocation::Reused("F-ACME-003".to_string())
    );
    assert_eq!(
        allocate(INVOICE_PREFIX, "ACME", &used, &[]).number(),
        "F-ACME-005"
    );
    assert_eq!(allocate(INVOICE_PREFIX, "ACME", &[], &[]).number(), "F-ACME-001");
}
