use crate::models::{InvoiceLine, InvoiceStatus, Variant};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection};

/// 报价主表
#[derive(Debug, Clone, FromRow)]
pub struct QuoteRow {
    pub id: i64,
    pub project_id: i64,
    pub number: String,
    pub status: String,
    pub subtotal: BigDecimal,
    pub total: BigDecimal,
    pub tps_rate: BigDecimal,
    pub tvq_rate: BigDecimal,
    pub deposit_percent: BigDecimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct SectionRow {
    pub id: i64,
    pub quote_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: i64,
    pub section_id: i64,
    pub title: String,
    pub item_types: Vec<String>,
    pub billing_mode: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub hourly_rate: Option<BigDecimal>,
    pub hours: Option<BigDecimal>,
    pub include_in_total: bool,
    pub is_selected: bool,
    pub variants: Json<Vec<Variant>>,
    pub selected_variant: Option<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DiscountRow {
    pub discount_type: String,
    pub value: BigDecimal,
    pub label: String,
    pub reason: Option<String>,
}

/// 发票主表
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub id: i64,
    pub project_id: i64,
    pub quote_id: Option<i64>,
    pub number: String,
    pub invoice_type: String,
    pub status: String,
    pub subtotal: BigDecimal,
    pub tps_amount: BigDecimal,
    pub tvq_amount: BigDecimal,
    pub total: BigDecimal,
    pub balance_amount: BigDecimal,
    pub amount_paid: BigDecimal,
    pub due_date: Option<NaiveDate>,
    pub is_number_reusable: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceItemRow {
    pub invoice_id: i64,
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub total: BigDecimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct ExpenseRow {
    pub id: i64,
    pub project_id: i64,
    pub description: String,
    pub amount: BigDecimal,
    pub is_billable: bool,
    pub is_billed: bool,
    pub invoice_id: Option<i64>,
}

/// 新发票
#[derive(Debug, Clone)]
pub struct NewInvoice<'a> {
    pub project_id: i64,
    pub quote_id: Option<i64>,
    pub number: &'a str,
    pub invoice_type: &'a str,
    pub subtotal: &'a BigDecimal,
    pub tps_amount: &'a BigDecimal,
    pub tvq_amount: &'a BigDecimal,
    pub total: &'a BigDecimal,
    pub balance_amount: &'a BigDecimal,
    pub due_date: Option<NaiveDate>,
}

const QUOTE_SELECT: &str = r#"
    SELECT id, project_id, number, status, subtotal, total,
           tps_rate, tvq_rate, deposit_percent
    FROM quotes
    WHERE id = $1
"#;

const INVOICE_COLUMNS: &str = r#"
    id, project_id, quote_id, number, invoice_type, status,
    subtotal, tps_amount, tvq_amount, total, balance_amount, amount_paid,
    due_date, is_number_reusable, created_at
"#;

/// 查询报价主表
pub async fn get_quote(conn: &mut PgConnection, quote_id: i64) -> Result<Option<QuoteRow>, sqlx::Error> {
    sqlx::query_as::<_, QuoteRow>(QUOTE_SELECT)
        .bind(quote_id)
        .fetch_optional(&mut *conn)
        .await
}

/// 查询并锁定报价 (同一报价的开票请求串行执行)
pub async fn lock_quote(conn: &mut PgConnection, quote_id: i64) -> Result<Option<QuoteRow>, sqlx::Error> {
    let sql = format!("{} FOR UPDATE", QUOTE_SELECT.trim_end());
    sqlx::query_as::<_, QuoteRow>(&sql)
        .bind(quote_id)
        .fetch_optional(&mut *conn)
        .await
}

/// 锁定项目所属客户并返回其编号代码
///
/// 同一客户的发票编号分配串行执行 (不同报价共享编号序列)。
pub async fn lock_client_for_project(
    conn: &mut PgConnection,
    project_id: i64,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT c.code
        FROM projects p
        INNER JOIN clients c ON c.id = p.client_id
        WHERE p.id = $1
        FOR UPDATE OF c
        "#,
    )
    .bind(project_id)
    .fetch_optional(&mut *conn)
    .await
}

pub async fn list_sections(conn: &mut PgConnection, quote_id: i64) -> Result<Vec<SectionRow>, sqlx::Error> {
    sqlx::query_as::<_, SectionRow>(
        r#"
        SELECT id, quote_id, title
        FROM quote_sections
        WHERE quote_id = $1
        ORDER BY position, id
        "#,
    )
    .bind(quote_id)
    .fetch_all(&mut *conn)
    .await
}

/// 报价的全部项目 (按分组和位置排序)
pub async fn list_items(conn: &mut PgConnection, quote_id: i64) -> Result<Vec<ItemRow>, sqlx::Error> {
    sqlx::query_as::<_, ItemRow>(
        r#"
        SELECT qi.id, qi.section_id, qi.title, qi.item_types, qi.billing_mode,
               qi.quantity, qi.unit_price, qi.hourly_rate, qi.hours,
               qi.include_in_total, qi.is_selected, qi.variants, qi.selected_variant
        FROM quote_items qi
        INNER JOIN quote_sections qs ON qs.id = qi.section_id
        WHERE qs.quote_id = $1
        ORDER BY qs.position, qs.id, qi.position, qi.id
        "#,
    )
    .bind(quote_id)
    .fetch_all(&mut *conn)
    .await
}

pub async fn list_discounts(conn: &mut PgConnection, quote_id: i64) -> Result<Vec<DiscountRow>, sqlx::Error> {
    sqlx::query_as::<_, DiscountRow>(
        r#"
        SELECT discount_type, value, label, reason
        FROM quote_discounts
        WHERE quote_id = $1
        ORDER BY position, id
        "#,
    )
    .bind(quote_id)
    .fetch_all(&mut *conn)
    .await
}

/// 报价下的发票 (`include_cancelled` 为 false 时排除已取消)
pub async fn list_quote_invoices(
    conn: &mut PgConnection,
    quote_id: i64,
    include_cancelled: bool,
) -> Result<Vec<InvoiceRow>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM invoices WHERE quote_id = $1 AND ($2 OR status <> 'CANCELLED') ORDER BY created_at, id",
        INVOICE_COLUMNS
    );
    sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(quote_id)
        .bind(include_cancelled)
        .fetch_all(&mut *conn)
        .await
}

/// 查询并锁定发票
pub async fn lock_invoice(conn: &mut PgConnection, invoice_id: i64) -> Result<Option<InvoiceRow>, sqlx::Error> {
    let sql = format!("SELECT {} FROM invoices WHERE id = $1 FOR UPDATE", INVOICE_COLUMNS);
    sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await
}

/// 已发送且到期日早于 `today` 的发票
pub async fn list_sent_due_before(
    conn: &mut PgConnection,
    today: NaiveDate,
) -> Result<Vec<InvoiceRow>, sqlx::Error> {
    let sql = format!(
        "SELECT {} FROM invoices WHERE status = 'SENT' AND due_date < $1 ORDER BY id FOR UPDATE",
        INVOICE_COLUMNS
    );
    sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(today)
        .fetch_all(&mut *conn)
        .await
}

pub async fn list_invoice_items(
    conn: &mut PgConnection,
    invoice_ids: &[i64],
) -> Result<Vec<InvoiceItemRow>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceItemRow>(
        r#"
        SELECT invoice_id, description, quantity, unit_price, total
        FROM invoice_items
        WHERE invoice_id = ANY($1)
        ORDER BY invoice_id, position, id
        "#,
    )
    .bind(invoice_ids)
    .fetch_all(&mut *conn)
    .await
}

/// 查询并锁定待计费的费用
pub async fn lock_expenses(conn: &mut PgConnection, expense_ids: &[i64]) -> Result<Vec<ExpenseRow>, sqlx::Error> {
    sqlx::query_as::<_, ExpenseRow>(
        r#"
        SELECT id, project_id, description, amount, is_billable, is_billed, invoice_id
        FROM expenses
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(expense_ids)
    .fetch_all(&mut *conn)
    .await
}

/// 客户的所有发票编号，以及其中可复用的编号
pub async fn list_invoice_numbers(
    conn: &mut PgConnection,
    number_prefix: &str,
) -> Result<(Vec<String>, Vec<String>), sqlx::Error> {
    let rows: Vec<(String, bool)> = sqlx::query_as(
        r#"
        SELECT number, (status = 'CANCELLED' AND is_number_reusable) AS reusable
        FROM invoices
        WHERE number LIKE ($1 || '%')
        "#,
    )
    .bind(number_prefix)
    .fetch_all(&mut *conn)
    .await?;

    let used = rows.iter().map(|(n, _)| n.clone()).collect();
    let reusable = rows.into_iter().filter(|(_, r)| *r).map(|(n, _)| n).collect();
    Ok((used, reusable))
}

/// 编号被复用后，原已取消发票不再可复用
pub async fn clear_number_reusable(conn: &mut PgConnection, number: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET is_number_reusable = FALSE
        WHERE number = $1 AND status = 'CANCELLED'
        "#,
    )
    .bind(number)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// 插入发票主表，返回新ID和创建时间
pub async fn insert_invoice(
    conn: &mut PgConnection,
    invoice: &NewInvoice<'_>,
) -> Result<(i64, DateTime<Utc>), sqlx::Error> {
    sqlx::query_as::<_, (i64, DateTime<Utc>)>(
        r#"
        INSERT INTO invoices (
            project_id, quote_id, number, invoice_type, status,
            subtotal, tps_amount, tvq_amount, total, balance_amount, due_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id, created_at
        "#,
    )
    .bind(invoice.project_id)
    .bind(invoice.quote_id)
    .bind(invoice.number)
    .bind(invoice.invoice_type)
    .bind(InvoiceStatus::Draft.as_str())
    .bind(invoice.subtotal)
    .bind(invoice.tps_amount)
    .bind(invoice.tvq_amount)
    .bind(invoice.total)
    .bind(invoice.balance_amount)
    .bind(invoice.due_date)
    .fetch_one(&mut *conn)
    .await
}

/// 批量插入发票明细
pub async fn insert_invoice_items(
    conn: &mut PgConnection,
    invoice_id: i64,
    items: &[InvoiceLine],
) -> Result<(), sqlx::Error> {
    if items.is_empty() {
        return Ok(());
    }

    let start_time = std::time::Instant::now();

    let mut query_builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(
        "INSERT INTO invoice_items (invoice_id, description, quantity, unit_price, total, position) ",
    );

    query_builder.push_values(items.iter().enumerate(), |mut b, (position, item)| {
        b.push_bind(invoice_id)
            .push_bind(&item.description)
            .push_bind(&item.quantity)
            .push_bind(&item.unit_price)
            .push_bind(&item.total)
            .push_bind(position as i32);
    });

    // 超时控制: 30秒
    let execute_result = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        query_builder.build().execute(&mut *conn),
    )
    .await;

    match execute_result {
        Ok(Ok(result)) => {
            tracing::debug!(
                "Invoice {}: inserted {} lines in {:?}",
                invoice_id,
                result.rows_affected(),
                start_time.elapsed()
            );
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!("Invoice {}: line insert failed after {:?}: {:?}", invoice_id, start_time.elapsed(), e);
            Err(e)
        }
        Err(_) => {
            tracing::error!("Invoice {}: line insert timed out (>30s)", invoice_id);
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

/// 原子认领费用：只有 is_billed = false 的行会被更新
pub async fn claim_expenses(
    conn: &mut PgConnection,
    invoice_id: i64,
    expense_ids: &[i64],
) -> Result<u64, sqlx::Error> {
    if expense_ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        r#"
        UPDATE expenses
        SET is_billed = TRUE, invoice_id = $1
        WHERE id = ANY($2) AND is_billed = FALSE
        "#,
    )
    .bind(invoice_id)
    .bind(expense_ids)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// 释放发票上的费用 (发票取消时)
pub async fn release_expenses(conn: &mut PgConnection, invoice_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE expenses
        SET is_billed = FALSE, invoice_id = NULL
        WHERE invoice_id = $1
        "#,
    )
    .bind(invoice_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn update_item_selection(
    conn: &mut PgConnection,
    item_id: i64,
    is_selected: bool,
    selected_variant: Option<i32>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE quote_items
        SET is_selected = $2, selected_variant = $3
        WHERE id = $1
        "#,
    )
    .bind(item_id)
    .bind(is_selected)
    .bind(selected_variant)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_quote_totals(
    conn: &mut PgConnection,
    quote_id: i64,
    subtotal: &BigDecimal,
    total: &BigDecimal,
    status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE quotes
        SET subtotal = $2, total = $3, status = $4
        WHERE id = $1
        "#,
    )
    .bind(quote_id)
    .bind(subtotal)
    .bind(total)
    .bind(status)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// 更新发票状态和付款字段
pub async fn update_invoice_state(
    conn: &mut PgConnection,
    invoice_id: i64,
    status: &str,
    amount_paid: &BigDecimal,
    is_number_reusable: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE invoices
        SET status = $2, amount_paid = $3, is_number_reusable = $4
        WHERE id = $1
        "#,
    )
    .bind(invoice_id)
    .bind(status)
    .bind(amount_paid)
    .bind(is_number_reusable)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
