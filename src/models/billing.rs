use crate::models::{Expense, InvoiceLine, InvoiceType};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// 调用方请求的发票类型
///
/// 非订金请求只是建议，最终类型由余额是否被消耗完决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedInvoiceType {
    Deposit,
    Partial,
    Final,
}

/// 从报价开票的请求
#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    pub requested_type: RequestedInvoiceType,
    /// 含税金额；为空时开具全部剩余余额
    pub requested_amount: Option<BigDecimal>,
    pub expenses: Vec<Expense>,
}

impl InvoiceRequest {
    pub fn deposit() -> Self {
        Self {
            requested_type: RequestedInvoiceType::Deposit,
            requested_amount: None,
            expenses: Vec::new(),
        }
    }

    pub fn payment(requested_amount: Option<BigDecimal>) -> Self {
        Self {
            requested_type: RequestedInvoiceType::Final,
            requested_amount,
            expenses: Vec::new(),
        }
    }

    pub fn with_expenses(mut self, expenses: Vec<Expense>) -> Self {
        self.expenses = expenses;
        self
    }
}

/// 计算出的发票 (由调用方持久化)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedInvoice {
    pub invoice_type: InvoiceType,
    pub subtotal: BigDecimal,
    pub tps_amount: BigDecimal,
    pub tvq_amount: BigDecimal,
    pub total: BigDecimal,
    /// 计入报价余额的含税金额 (纯费用发票为 0)
    pub balance_amount: BigDecimal,
    pub items: Vec<InvoiceLine>,
    /// 本张发票消耗的费用ID
    pub expense_ids: Vec<i64>,
}

/// 报价开票进度
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingSummary {
    pub quote_id: i64,
    pub quote_total: BigDecimal,
    pub total_invoiced: BigDecimal,
    pub remaining_balance: BigDecimal,
    pub has_deposit: bool,
    /// 订金发票的含税金额预览
    pub deposit_amount: BigDecimal,
    pub fully_invoiced: bool,
}

/// 审计台账行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRow {
    pub invoice_number: String,
    pub invoice_type: InvoiceType,
    pub status: String,
    pub issued_at: String,
    pub total: BigDecimal,
    pub amount_paid: BigDecimal,
    /// 开具该发票后的剩余余额
    pub remaining_balance: BigDecimal,
}
