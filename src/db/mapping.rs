//! 数据库行 → 领域类型

use crate::db::queries::{
    DiscountRow, ExpenseRow, InvoiceItemRow, InvoiceRow, ItemRow, QuoteRow, SectionRow,
};
use crate::error::BillingError;
use crate::models::{
    Discount, Expense, Invoice, InvoiceLine, ItemTypes, Quote, QuoteItem, Section,
};
use std::collections::HashMap;

/// 组装报价树 (报价 → 分组 → 项目)
pub fn assemble_quote(
    row: QuoteRow,
    sections: Vec<SectionRow>,
    items: Vec<ItemRow>,
    discounts: Vec<DiscountRow>,
) -> Result<Quote, BillingError> {
    let mut items_by_section: HashMap<i64, Vec<QuoteItem>> = HashMap::new();
    for item in items {
        let section_id = item.section_id;
        items_by_section
            .entry(section_id)
            .or_default()
            .push(item_from_row(item)?);
    }

    let sections = sections
        .into_iter()
        .map(|s| Section {
            items: items_by_section.remove(&s.id).unwrap_or_default(),
            id: s.id,
            title: s.title,
        })
        .collect();

    let discounts = discounts
        .into_iter()
        .map(|d| {
            Ok(Discount {
                discount_type: d.discount_type.parse()?,
                value: d.value,
                label: d.label,
                reason: d.reason,
            })
        })
        .collect::<Result<Vec<_>, BillingError>>()?;

    Ok(Quote {
        id: row.id,
        project_id: row.project_id,
        status: row.status.parse()?,
        number: row.number,
        subtotal: row.subtotal,
        total: row.total,
        tps_rate: row.tps_rate,
        tvq_rate: row.tvq_rate,
        deposit_percent: row.deposit_percent,
        discounts,
        sections,
    })
}

fn item_from_row(row: ItemRow) -> Result<QuoteItem, BillingError> {
    let selected_variant = match row.selected_variant {
        Some(idx) if idx >= 0 => Some(idx as usize),
        _ => None,
    };
    Ok(QuoteItem {
        id: row.id,
        title: row.title,
        item_types: ItemTypes::parse_all(&row.item_types)?,
        billing_mode: row.billing_mode.parse()?,
        quantity: row.quantity,
        unit_price: row.unit_price,
        hourly_rate: row.hourly_rate,
        hours: row.hours,
        include_in_total: row.include_in_total,
        is_selected: row.is_selected,
        variants: row.variants.0,
        selected_variant,
    })
}

/// 发票行 + 明细 → 发票
pub fn invoices_from_rows(
    rows: Vec<InvoiceRow>,
    items: Vec<InvoiceItemRow>,
) -> Result<Vec<Invoice>, BillingError> {
    let mut lines_by_invoice: HashMap<i64, Vec<InvoiceLine>> = HashMap::new();
    for item in items {
        lines_by_invoice.entry(item.invoice_id).or_default().push(InvoiceLine {
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.total,
        });
    }

    rows.into_iter()
        .map(|row| {
            let items = lines_by_invoice.remove(&row.id).unwrap_or_default();
            invoice_from_row(row, items)
        })
        .collect()
}

pub fn invoice_from_row(row: InvoiceRow, items: Vec<InvoiceLine>) -> Result<Invoice, BillingError> {
    Ok(Invoice {
        id: row.id,
        project_id: row.project_id,
        quote_id: row.quote_id,
        number: row.number,
        invoice_type: row.invoice_type.parse()?,
        status: row.status.parse()?,
        subtotal: row.subtotal,
        tps_amount: row.tps_amount,
        tvq_amount: row.tvq_amount,
        total: row.total,
        balance_amount: row.balance_amount,
        amount_paid: row.amount_paid,
        due_date: row.due_date,
        is_number_reusable: row.is_number_reusable,
        created_at: row.created_at,
        items,
    })
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Self {
            id: row.id,
            project_id: row.project_id,
            description: row.description,
            amount: row.amount,
            is_billable: row.is_billable,
            is_billed: row.is_billed,
            invoice_id: row.invoice_id,
        }
    }
}
