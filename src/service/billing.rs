use crate::db::mapping::{assemble_quote, invoices_from_rows};
use crate::db::queries::{self, NewInvoice};
use crate::error::{BillingError, BillingResult};
use crate::models::{
    BillingSummary, Expense, Invoice, InvoiceRequest, InvoiceStatus, PriorInvoice, Quote,
    RequestedInvoiceType,
};
use crate::service::numbering::{self, Allocation, INVOICE_PREFIX};
use crate::service::pricing::{quote_preview, QuotePreview, QuoteTotals};
use crate::service::{approval, derivation, ledger, lifecycle};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use std::collections::{BTreeSet, HashMap};

/// 订金唯一索引名 (见 migrations)
const DEPOSIT_UNIQUE_INDEX: &str = "invoices_one_deposit_per_quote";

/// 计费服务：读取数据 → 调用推导引擎 → 在同一事务中持久化
pub struct BillingService {
    pool: PgPool,
    payment_terms_days: u32,
}

impl BillingService {
    pub fn new(pool: PgPool, payment_terms_days: u32) -> Self {
        Self {
            pool,
            payment_terms_days,
        }
    }

    /// 从报价开票
    ///
    /// 锁定报价行，同一报价的并发请求按顺序推导，费用通过 CAS 认领。
    pub async fn create_invoice_from_quote(
        &self,
        quote_id: i64,
        requested_type: RequestedInvoiceType,
        requested_amount: Option<BigDecimal>,
        expense_ids: &[i64],
    ) -> BillingResult<Invoice> {
        let mut tx = self.pool.begin().await?;

        // 1. 锁定报价并重新读取已开发票
        let quote = load_quote(&mut tx, quote_id, true).await?;
        let prior = load_prior_invoices(&mut tx, quote_id).await?;

        // 2. 锁定费用 (保持请求顺序)
        let expenses = load_expenses(&mut tx, expense_ids).await?;

        // 3. 推导
        let request = InvoiceRequest {
            requested_type,
            requested_amount,
            expenses,
        };
        let derived = derivation::derive_invoice(&quote, &prior, &request)?;

        // 4. 锁定客户后分配编号
        let client_code = queries::lock_client_for_project(&mut tx, quote.project_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("client of project {}", quote.project_id)))?;
        let number_prefix = format!("{}-{}-", INVOICE_PREFIX, client_code);
        let (used, reusable) = queries::list_invoice_numbers(&mut tx, &number_prefix).await?;
        let allocation = numbering::allocate(INVOICE_PREFIX, &client_code, &used, &reusable);
        if let Allocation::Reused(number) = &allocation {
            queries::clear_number_reusable(&mut tx, number).await?;
            tracing::info!("[Billing] Quote {}: reusing cancelled invoice number {}", quote.number, number);
        }

        // 5. 写入发票和明细
        let due_date = lifecycle::due_date(Utc::now().date_naive(), self.payment_terms_days);
        let new_invoice = NewInvoice {
            project_id: quote.project_id,
            quote_id: Some(quote.id),
            number: allocation.number(),
            invoice_type: derived.invoice_type.as_str(),
            subtotal: &derived.subtotal,
            tps_amount: &derived.tps_amount,
            tvq_amount: &derived.tvq_amount,
            total: &derived.total,
            balance_amount: &derived.balance_amount,
            due_date: Some(due_date),
        };
        let (invoice_id, created_at) = queries::insert_invoice(&mut tx, &new_invoice)
            .await
            .map_err(|e| map_insert_error(e, quote.id))?;
        queries::insert_invoice_items(&mut tx, invoice_id, &derived.items).await?;

        // 6. 认领费用，行数不一致说明有并发请求抢先
        let claimed = queries::claim_expenses(&mut tx, invoice_id, &derived.expense_ids).await?;
        if claimed != derived.expense_ids.len() as u64 {
            tracing::warn!(
                "[Billing] Quote {}: claimed {}/{} expenses, rolling back",
                quote.number,
                claimed,
                derived.expense_ids.len()
            );
            let first = derived.expense_ids.first().copied().unwrap_or_default();
            return Err(BillingError::ExpenseUnavailable(first));
        }

        tx.commit().await?;

        tracing::info!(
            "[Billing] Quote {}: created {} invoice {} (total {}, {} expenses)",
            quote.number,
            derived.invoice_type,
            allocation.number(),
            derived.total,
            derived.expense_ids.len()
        );

        Ok(Invoice {
            id: invoice_id,
            project_id: quote.project_id,
            quote_id: Some(quote.id),
            number: allocation.number().to_string(),
            invoice_type: derived.invoice_type,
            status: InvoiceStatus::Draft,
            subtotal: derived.subtotal,
            tps_amount: derived.tps_amount,
            tvq_amount: derived.tvq_amount,
            total: derived.total,
            balance_amount: derived.balance_amount,
            amount_paid: BigDecimal::from(0),
            due_date: Some(due_date),
            is_number_reusable: false,
            created_at,
            items: derived.items,
        })
    }

    /// 报价开票进度
    pub async fn billing_summary(&self, quote_id: i64) -> BillingResult<BillingSummary> {
        let mut conn = self.pool.acquire().await?;
        let quote = load_quote(&mut conn, quote_id, false).await?;
        let prior = load_prior_invoices(&mut conn, quote_id).await?;
        Ok(derivation::billing_summary(&quote, &prior))
    }

    /// 报价预览 (PDF 渲染数据)
    pub async fn quote_preview(&self, quote_id: i64) -> BillingResult<QuotePreview> {
        let mut conn = self.pool.acquire().await?;
        let quote = load_quote(&mut conn, quote_id, false).await?;
        Ok(quote_preview(&quote))
    }

    /// 报价开票台账 CSV
    pub async fn quote_ledger_csv(&self, quote_id: i64) -> BillingResult<Vec<u8>> {
        let mut conn = self.pool.acquire().await?;
        let quote = load_quote(&mut conn, quote_id, false).await?;
        let rows = queries::list_quote_invoices(&mut conn, quote_id, true).await?;
        let invoices = invoices_from_rows(rows, Vec::new())?;
        ledger::write_ledger_csv(&ledger::ledger(&quote, &invoices))
    }

    /// 客户批准报价
    ///
    /// 选择先单独提交，重算失败时选择仍然保留。
    pub async fn approve_quote(
        &self,
        quote_id: i64,
        item_selections: &HashMap<i64, bool>,
        variant_selections: &HashMap<i64, usize>,
    ) -> BillingResult<QuoteTotals> {
        let mut tx = self.pool.begin().await?;
        let mut quote = load_quote(&mut tx, quote_id, true).await?;
        approval::ensure_approvable(&quote)?;
        approval::apply_selections(&mut quote, item_selections, variant_selections)?;

        let touched: BTreeSet<i64> = item_selections
            .keys()
            .chain(variant_selections.keys())
            .copied()
            .collect();
        for item in quote.items().filter(|item| touched.contains(&item.id)) {
            let selected_variant = item.selected_variant.map(|idx| idx as i32);
            queries::update_item_selection(&mut tx, item.id, item.is_selected, selected_variant).await?;
        }
        tx.commit().await?;
        tracing::info!("[Billing] Quote {}: saved {} item selections", quote.number, touched.len());

        let mut tx = self.pool.begin().await?;
        let mut quote = load_quote(&mut tx, quote_id, true).await?;
        let totals = approval::finalize_approval(&mut quote)?;
        queries::update_quote_totals(
            &mut tx,
            quote.id,
            &quote.subtotal,
            &quote.total,
            quote.status.as_str(),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            "[Billing] Quote {}: accepted, subtotal {}, total {}",
            quote.number,
            quote.subtotal,
            quote.total
        );
        Ok(totals)
    }

    /// 发票状态流转
    pub async fn change_invoice_status(&self, invoice_id: i64, next: InvoiceStatus) -> BillingResult<Invoice> {
        if next == InvoiceStatus::Cancelled {
            return self.cancel_invoice(invoice_id, false).await;
        }
        self.update_invoice(invoice_id, |invoice| lifecycle::transition(invoice, next))
            .await
    }

    /// 登记付款
    pub async fn record_payment(&self, invoice_id: i64, amount: &BigDecimal) -> BillingResult<Invoice> {
        self.update_invoice(invoice_id, |invoice| lifecycle::record_payment(invoice, amount))
            .await
    }

    /// 取消发票并释放其费用
    pub async fn cancel_invoice(&self, invoice_id: i64, release_number: bool) -> BillingResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        let mut invoice = lock_invoice(&mut tx, invoice_id).await?;
        lifecycle::cancel(&mut invoice, release_number)?;
        save_invoice_state(&mut tx, &invoice).await?;
        let released = queries::release_expenses(&mut tx, invoice.id).await?;
        tx.commit().await?;

        tracing::info!(
            "[Billing] Invoice {}: cancelled (number reusable: {}, {} expenses released)",
            invoice.number,
            release_number,
            released
        );
        Ok(invoice)
    }

    /// 把到期未付的已发送发票标记为逾期
    pub async fn mark_overdue(&self, today: NaiveDate) -> BillingResult<usize> {
        let mut tx = self.pool.begin().await?;
        let rows = queries::list_sent_due_before(&mut tx, today).await?;
        let invoices = invoices_from_rows(rows, Vec::new())?;

        let mut marked = 0usize;
        for mut invoice in invoices {
            if !lifecycle::is_overdue(&invoice, today) {
                continue;
            }
            lifecycle::transition(&mut invoice, InvoiceStatus::Overdue)?;
            save_invoice_state(&mut tx, &invoice).await?;
            marked += 1;
        }
        tx.commit().await?;

        tracing::info!("[Billing] Overdue sweep for {}: {} invoices marked", today, marked);
        Ok(marked)
    }

    async fn update_invoice<F>(&self, invoice_id: i64, apply: F) -> BillingResult<Invoice>
    where
        F: FnOnce(&mut Invoice) -> BillingResult<()>,
    {
        let mut tx = self.pool.begin().await?;
        let mut invoice = lock_invoice(&mut tx, invoice_id).await?;
        let before = invoice.status;
        apply(&mut invoice)?;
        save_invoice_state(&mut tx, &invoice).await?;
        tx.commit().await?;

        tracing::info!(
            "[Billing] Invoice {}: {} -> {}, paid {}",
            invoice.number,
            before,
            invoice.status,
            invoice.amount_paid
        );
        Ok(invoice)
    }
}

async fn load_quote(conn: &mut PgConnection, quote_id: i64, lock: bool) -> BillingResult<Quote> {
    let row = if lock {
        queries::lock_quote(conn, quote_id).await?
    } else {
        queries::get_quote(conn, quote_id).await?
    };
    let Some(row) = row else {
        return Err(BillingError::NotFound(format!("quote {}", quote_id)));
    };

    let sections = queries::list_sections(conn, quote_id).await?;
    let items = queries::list_items(conn, quote_id).await?;
    let discounts = queries::list_discounts(conn, quote_id).await?;
    assemble_quote(row, sections, items, discounts)
}

async fn load_prior_invoices(conn: &mut PgConnection, quote_id: i64) -> BillingResult<Vec<PriorInvoice>> {
    let rows = queries::list_quote_invoices(conn, quote_id, false).await?;
    let invoices = invoices_from_rows(rows, Vec::new())?;
    Ok(invoices.iter().map(PriorInvoice::from).collect())
}

async fn load_expenses(conn: &mut PgConnection, expense_ids: &[i64]) -> BillingResult<Vec<Expense>> {
    if expense_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = queries::lock_expenses(conn, expense_ids).await?;
    let by_id: HashMap<i64, Expense> = rows.into_iter().map(|r| (r.id, Expense::from(r))).collect();
    expense_ids
        .iter()
        .map(|id| {
            by_id
                .get(id)
                .cloned()
                .ok_or_else(|| BillingError::NotFound(format!("expense {}", id)))
        })
        .collect()
}

async fn lock_invoice(conn: &mut PgConnection, invoice_id: i64) -> BillingResult<Invoice> {
    let row = queries::lock_invoice(conn, invoice_id)
        .await?
        .ok_or_else(|| BillingError::NotFound(format!("invoice {}", invoice_id)))?;
    let items = queries::list_invoice_items(conn, &[invoice_id]).await?;
    invoices_from_rows(vec![row], items)?
        .pop()
        .ok_or_else(|| BillingError::NotFound(format!("invoice {}", invoice_id)))
}

async fn save_invoice_state(conn: &mut PgConnection, invoice: &Invoice) -> BillingResult<()> {
    queries::update_invoice_state(
        conn,
        invoice.id,
        invoice.status.as_str(),
        &invoice.amount_paid,
        invoice.is_number_reusable,
    )
    .await?;
    Ok(())
}

/// 订金唯一索引冲突 → DuplicateDeposit
fn map_insert_error(err: sqlx::Error, quote_id: i64) -> BillingError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() && db_err.constraint() == Some(DEPOSIT_UNIQUE_INDEX) {
            return BillingError::DuplicateDeposit { quote_id };
        }
    }
    BillingError::Database(err)
}
