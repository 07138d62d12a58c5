mod common;

use bigdecimal::BigDecimal;
use common::{assert_close, dec, expense, issued, lines_total, prior_invoice, sample_quote};
use studio_billing::error::BillingError;
use studio_billing::models::{
    DerivedInvoice, InvoiceRequest, InvoiceType, PriorInvoice, Quote, QuoteStatus,
    RequestedInvoiceType,
};
use studio_billing::service::derivation::{billing_summary, derive_invoice, total_invoiced};

#[test]
fn deposit_takes_percentage_of_quote_total() {
    let quote = sample_quote();

    let deposit = derive_invoice(&quote, &[], &InvoiceRequest::deposit()).unwrap();

    assert_eq!(deposit.invoice_type, InvoiceType::Deposit);
    assert_eq!(deposit.subtotal, dec("500.00"));
    assert_eq!(deposit.tps_amount, dec("25.00"));
    assert_eq!(deposit.tvq_amount, dec("50.00"));
    assert_eq!(deposit.total, dec("575.00"));
    assert_eq!(deposit.balance_amount, dec("575.00"));
    assert_eq!(deposit.items.len(), 1);
    assert_eq!(deposit.items[0].description, "Deposit (50%) — Quote D-ACME-001");
}

#[test]
fn final_invoice_consumes_remaining_balance() {
    let quote = sample_quote();
    let deposit = derive_invoice(&quote, &[], &InvoiceRequest::deposit()).unwrap();
    let prior = vec![issued(&deposit)];

    let last = derive_invoice(&quote, &prior, &InvoiceRequest::payment(None)).unwrap();

    assert_eq!(last.invoice_type, InvoiceType::Final);
    assert_eq!(last.subtotal, dec("500.00"));
    assert_eq!(last.total, dec("575.00"));
    assert_eq!(
        last.items[0].description,
        "Final payment — Quote D-ACME-001: Logo, Website"
    );

    let prior = vec![issued(&deposit), issued(&last)];
    let summary = billing_summary(&quote, &prior);
    assert!(summary.fully_invoiced);
    assert!(summary.has_deposit);
    assert_eq!(summary.remaining_balance, dec("0.00"));
    assert_eq!(summary.total_invoiced, dec("1150.00"));
}

#[test]
fn expenses_after_full_billing_become_standalone() {
    let quote = sample_quote();
    let prior = vec![
        prior_invoice(InvoiceType::Deposit, "575.00"),
        prior_invoice(InvoiceType::Final, "575.00"),
    ];
    let request = InvoiceRequest::payment(None).with_expenses(vec![expense(7, "50.00")]);

    let standalone = derive_invoice(&quote, &prior, &request).unwrap();

    assert_eq!(standalone.invoice_type, InvoiceType::Standalone);
    assert_eq!(standalone.subtotal, dec("50.00"));
    assert_eq!(standalone.tps_amount, dec("2.50"));
    assert_eq!(standalone.tvq_amount, dec("5.00"));
    assert_eq!(standalone.total, dec("57.50"));
    assert_eq!(standalone.balance_amount, dec("0"));
    assert_eq!(standalone.items.len(), 1);
    assert_eq!(standalone.items[0].description, "Expense #7");
    assert_eq!(standalone.expense_ids, vec![7]);

    // 纯费用发票不影响报价余额
    let mut after = prior.clone();
    after.push(issued(&standalone));
    assert_eq!(total_invoiced(&after), dec("1150.00"));
}

#[test]
fn partial_with_expenses_only_counts_base_against_quote() {
    let quote = sample_quote();
    let prior = vec![prior_invoice(InvoiceType::Deposit, "575.00")];
    let request =
        InvoiceRequest::payment(Some(dec("200.00"))).with_expenses(vec![expense(3, "50.00")]);

    let partial = derive_invoice(&quote, &prior, &request).unwrap();

    assert_eq!(partial.invoice_type, InvoiceType::Partial);
    assert_eq!(partial.subtotal, dec("223.91"));
    assert_eq!(partial.total, dec("257.50"));
    assert_eq!(partial.balance_amount, dec("200.00"));
    assert_eq!(lines_total(&partial), partial.subtotal);
    assert_eq!(
        partial.items[0].description,
        "Partial payment — Quote D-ACME-001: Logo, Website"
    );
}

#[test]
fn balance_is_conserved_across_a_billing_sequence() {
    let quote = sample_quote();
    let mut prior: Vec<PriorInvoice> = Vec::new();

    let requests = vec![
        InvoiceRequest::deposit(),
        InvoiceRequest::payment(Some(dec("200.00"))),
        InvoiceRequest::payment(Some(dec("100.00"))),
        InvoiceRequest::payment(None),
    ];
    for request in &requests {
        let derived = derive_invoice(&quote, &prior, request).unwrap();
        assert_eq!(lines_total(&derived), derived.subtotal);
        prior.push(issued(&derived));
    }

    assert_eq!(prior.last().map(|p| p.invoice_type), Some(InvoiceType::Final));
    assert_close(&total_invoiced(&prior), &quote.total, "0.05");
    assert!(billing_summary(&quote, &prior).fully_invoiced);
}

#[test]
fn second_deposit_is_rejected() {
    let quote = sample_quote();
    let prior = vec![prior_invoice(InvoiceType::Deposit, "575.00")];

    let err = derive_invoice(&quote, &prior, &InvoiceRequest::deposit()).unwrap_err();
    assert!(matches!(err, BillingError::DuplicateDeposit { quote_id: 1 }));
}

#[test]
fn amount_over_remaining_balance_is_rejected() {
    let quote = sample_quote();
    let prior = vec![prior_invoice(InvoiceType::Deposit, "575.00")];

    let err = derive_invoice(&quote, &prior, &InvoiceRequest::payment(Some(dec("700.00"))))
        .unwrap_err();
    match err {
        BillingError::AmountExceedsBalance {
            requested,
            remaining,
        } => {
            assert_eq!(requested, dec("700.00"));
            assert_eq!(remaining, dec("575.00"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn amount_within_tolerance_of_balance_is_final() {
    let quote = sample_quote();
    let prior = vec![prior_invoice(InvoiceType::Deposit, "575.00")];

    let derived =
        derive_invoice(&quote, &prior, &InvoiceRequest::payment(Some(dec("575.05")))).unwrap();
    assert_eq!(derived.invoice_type, InvoiceType::Final);
}

#[test]
fn unaccepted_quote_cannot_be_invoiced() {
    for status in [QuoteStatus::Draft, QuoteStatus::Sent, QuoteStatus::Rejected] {
        let mut quote = sample_quote();
        quote.status = status;

        let err = derive_invoice(&quote, &[], &InvoiceRequest::deposit()).unwrap_err();
        assert!(matches!(err, BillingError::InvalidState(_)));
    }
}

#[test]
fn fully_invoiced_quote_without_expenses_is_rejected() {
    let quote = sample_quote();
    let prior = vec![prior_invoice(InvoiceType::Final, "1150.00")];

    let err = derive_invoice(&quote, &prior, &InvoiceRequest::payment(None)).unwrap_err();
    assert!(matches!(err, BillingError::InvalidState(_)));
}

#[test]
fn non_positive_amount_is_rejected() {
    let quote = sample_quote();
    for amount in ["0", "-10.00"] {
        let err = derive_invoice(&quote, &[], &InvoiceRequest::payment(Some(dec(amount))))
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidAmount(_)));
    }
}

#[test]
fn unavailable_expenses_are_rejected() {
    let quote = sample_quote();

    let mut billed = expense(4, "20.00");
    billed.is_billed = true;
    let mut foreign = expense(5, "20.00");
    foreign.project_id = 99;
    let mut personal = expense(6, "20.00");
    personal.is_billable = false;

    for bad in [billed, foreign, personal] {
        let id = bad.id;
        let request = InvoiceRequest::payment(Some(dec("100.00"))).with_expenses(vec![bad]);
        let err = derive_invoice(&quote, &[], &request).unwrap_err();
        assert!(matches!(err, BillingError::ExpenseUnavailable(e) if e == id));
    }

    let request = InvoiceRequest::payment(Some(dec("100.00")))
        .with_expenses(vec![expense(8, "10.00"), expense(8, "10.00")]);
    let err = derive_invoice(&quote, &[], &request).unwrap_err();
    assert!(matches!(err, BillingError::ExpenseUnavailable(8)));
}

#[test]
fn type_resolution_is_deterministic() {
    let quote = sample_quote();
    let prior = vec![prior_invoice(InvoiceType::Deposit, "575.00")];
    let request = InvoiceRequest {
        requested_type: RequestedInvoiceType::Partial,
        requested_amount: Some(dec("300.00")),
        expenses: vec![expense(2, "15.00")],
    };

    let first = derive_invoice(&quote, &prior, &request).unwrap();
    let second = derive_invoice(&quote, &prior, &request).unwrap();

    assert_eq!(first.invoice_type, InvoiceType::Partial);
    assert_eq!(first.invoice_type, second.invoice_type);
    assert_eq!(first.total, second.total);
    assert_eq!(first.balance_amount, second.balance_amount);
}

#[test]
fn requested_gross_survives_tax_round_trip() {
    let quote = sample_quote();
    let prior = vec![prior_invoice(InvoiceType::Deposit, "575.00")];

    for amount in ["0.50", "1.00", "33.33", "99.99", "123.45", "200.00", "574.99"] {
        let derived =
            derive_invoice(&quote, &prior, &InvoiceRequest::payment(Some(dec(amount)))).unwrap();
        assert_close(&derived.total, &dec(amount), "0.01");
        let recovered = &derived.total / &quote.tax_multiplier();
        assert_close(&recovered, &derived.subtotal, "0.01");
    }
}

#[test]
fn deposit_without_percentage_is_rejected() {
    let mut quote = sample_quote();
    quote.deposit_percent = BigDecimal::from(0);

    let err = derive_invoice(&quote, &[], &InvoiceRequest::deposit()).unwrap_err();
    assert!(matches!(err, BillingError::InvalidAmount(_)));
}

#[test]
fn non_positive_expense_is_rejected() {
    let quote = sample_quote();
    let prior = vec![
        prior_invoice(InvoiceType::Deposit, "575.00"),
        prior_invoice(InvoiceType::Final, "575.00"),
    ];

    for amount in ["-50.00", "0.00"] {
        let request = InvoiceRequest::payment(None).with_expenses(vec![expense(9, amount)]);
        let err = derive_invoice(&quote, &prior, &request).unwrap_err();
        assert!(matches!(err, BillingError::InvalidAmount(_)));
    }
}

/// TPS 5% + TVQ 9.975%，报价总额 1149.75
fn quebec_quote() -> Quote {
    let mut quote = sample_quote();
    quote.tvq_rate = dec("0.09975");
    quote.total = dec("1149.75");
    quote
}

fn assert_invoice_adds_up(derived: &DerivedInvoice) {
    assert_eq!(
        derived.total,
        &(&derived.subtotal + &derived.tps_amount) + &derived.tvq_amount
    );
    assert_eq!(lines_total(derived), derived.subtotal);
}

#[test]
fn final_invoice_closes_quote_to_the_cent_at_quebec_rates() {
    let quote = quebec_quote();

    let deposit = derive_invoice(&quote, &[], &InvoiceRequest::deposit()).unwrap();
    assert_eq!(deposit.total, dec("574.88"));

    let prior = vec![issued(&deposit)];
    let last = derive_invoice(&quote, &prior, &InvoiceRequest::payment(None)).unwrap();

    assert_eq!(last.invoice_type, InvoiceType::Final);
    assert_eq!(last.total, dec("574.87"));
    assert_invoice_adds_up(&last);

    let prior = vec![issued(&deposit), issued(&last)];
    assert_eq!(total_invoiced(&prior), quote.total);
    assert_eq!(billing_summary(&quote, &prior).remaining_balance, dec("0.00"));
}

#[test]
fn partial_then_final_sum_to_quote_total_at_quebec_rates() {
    let quote = quebec_quote();
    let mut prior: Vec<PriorInvoice> = Vec::new();

    for request in [
        InvoiceRequest::deposit(),
        InvoiceRequest::payment(Some(dec("300.00"))),
        InvoiceRequest::payment(Some(dec("123.45"))),
        InvoiceRequest::payment(None),
    ] {
        let derived = derive_invoice(&quote, &prior, &request).unwrap();
        assert_invoice_adds_up(&derived);
        prior.push(issued(&derived));
    }

    assert_eq!(prior.last().map(|p| p.invoice_type), Some(InvoiceType::Final));
    assert_eq!(total_invoiced(&prior), quote.total);
}

#[test]
fn final_with_expenses_keeps_quote_portion_exact() {
    let quote = quebec_quote();
    let deposit = derive_invoice(&quote, &[], &InvoiceRequest::deposit()).unwrap();
    let prior = vec![issued(&deposit)];
    let request = InvoiceRequest::payment(None).with_expenses(vec![expense(5, "40.00")]);

    let last = derive_invoice(&quote, &prior, &request).unwrap();

    assert_eq!(last.invoice_type, InvoiceType::Final);
    assert_eq!(last.balance_amount, dec("574.87"));
    // 40.00 + TPS 2.00 + TVQ 3.99
    assert_eq!(last.total, dec("620.86"));
    assert_invoice_adds_up(&last);

    let prior = vec![issued(&deposit), issued(&last)];
    assert_eq!(total_invoiced(&prior), quote.total);
}
