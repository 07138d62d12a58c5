use bigdecimal::BigDecimal;
use thiserror::Error;

/// 计费引擎错误类型
#[derive(Debug, Error)]
pub enum BillingError {
    /// 报价/发票状态不允许该操作
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// 同一报价只允许一张未取消的订金发票
    #[error("a deposit invoice already exists for quote {quote_id}")]
    DuplicateDeposit { quote_id: i64 },

    /// 请求金额超过剩余余额 (携带剩余余额供前端显示)
    #[error("amount {requested} exceeds the remaining balance {remaining}")]
    AmountExceedsBalance {
        requested: BigDecimal,
        remaining: BigDecimal,
    },

    #[error("{0} not found")]
    NotFound(String),

    /// 费用不可计费、已计费或属于其他项目
    #[error("expense {0} is not available for billing")]
    ExpenseUnavailable(i64),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// 数据库中的值无法映射为领域类型
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("export error: {0}")]
    Export(#[from] csv::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type BillingResult<T> = Result<T, BillingError>;
