use crate::error::BillingError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 发票类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceType {
    Deposit,
    Partial,
    Final,
    Standalone,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::Deposit => "DEPOSIT",
            InvoiceType::Partial => "PARTIAL",
            InvoiceType::Final => "FINAL",
            InvoiceType::Standalone => "STANDALONE",
        }
    }

    /// 是否消耗报价余额 (纯费用发票不计入)
    pub fn counts_against_quote(&self) -> bool {
        !matches!(self, InvoiceType::Standalone)
    }
}

impl fmt::Display for InvoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(InvoiceType::Deposit),
            "PARTIAL" => Ok(InvoiceType::Partial),
            "FINAL" => Ok(InvoiceType::Final),
            "STANDALONE" => Ok(InvoiceType::Standalone),
            other => Err(BillingError::InvalidData(format!("unknown invoice type '{}'", other))),
        }
    }
}

/// 发票状态
///
/// DRAFT → SENT → PAID，SENT → OVERDUE → PAID，任何未付状态 → CANCELLED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Sent, Paid)
                | (Sent, Overdue)
                | (Overdue, Paid)
                | (Draft, Cancelled)
                | (Sent, Cancelled)
                | (Overdue, Cancelled)
        )
    }

    /// 可以登记付款的状态
    pub fn accepts_payment(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "SENT" => Ok(InvoiceStatus::Sent),
            "PAID" => Ok(InvoiceStatus::Paid),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            "CANCELLED" => Ok(InvoiceStatus::Cancelled),
            other => Err(BillingError::InvalidData(format!("unknown invoice status '{}'", other))),
        }
    }
}

/// 发票明细行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub total: BigDecimal,
}

/// 发票 (facture)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub project_id: i64,
    pub quote_id: Option<i64>,
    pub number: String,
    pub invoice_type: InvoiceType,
    pub status: InvoiceStatus,
    pub subtotal: BigDecimal,
    pub tps_amount: BigDecimal,
    pub tvq_amount: BigDecimal,
    pub total: BigDecimal,
    /// 计入报价余额的部分
    pub balance_amount: BigDecimal,
    pub amount_paid: BigDecimal,
    pub due_date: Option<NaiveDate>,
    pub is_number_reusable: bool,
    pub created_at: DateTime<Utc>,
    pub items: Vec<InvoiceLine>,
}

/// 同一报价下已开具的发票
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorInvoice {
    pub invoice_type: InvoiceType,
    pub total: BigDecimal,
    /// 计入报价余额的含税金额 (不含附带费用)
    pub balance_amount: BigDecimal,
}

impl From<&Invoice> for PriorInvoice {
    fn from(invoice: &Invoice) -> Self {
        Self {
            invoice_type: invoice.invoice_type,
            total: invoice.total.clone(),
            balance_amount: invoice.balance_amount.clone(),
        }
    }
}
