use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// 项目费用 (税前金额)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub project_id: i64,
    pub description: String,
    pub amount: BigDecimal,
    pub is_billable: bool,
    pub is_billed: bool,
    pub invoice_id: Option<i64>,
}

impl Expense {
    /// 可计费且尚未挂到发票上
    pub fn is_available_for(&self, project_id: i64) -> bool {
        self.project_id == project_id && self.is_billable && !self.is_billed
    }
}
