//! 发票编号：`F-<客户代码>-<序号>`
//!
//! 已取消且标记为可复用的发票编号优先分配。

pub const INVOICE_PREFIX: &str = "F";

pub fn format_number(prefix: &str, client_code: &str, seq: u32) -> String {
    format!("{}-{}-{:03}", prefix, client_code, seq)
}

/// 解析编号中的序号；前缀或客户代码不匹配时返回 None
pub fn parse_sequence(number: &str, prefix: &str, client_code: &str) -> Option<u32> {
    let rest = number
        .strip_prefix(prefix)?
        .strip_prefix('-')?
        .strip_prefix(client_code)?
        .strip_prefix('-')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// 分配结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    /// 复用已取消发票的编号
    Reused(String),
    Fresh(String),
}

impl Allocation {
    pub fn number(&self) -> &str {
        match self {
            Allocation::Reused(n) | Allocation::Fresh(n) => n,
        }
    }
}

/// 分配编号：序号最小的可复用编号，否则已用最大序号 + 1
pub fn allocate(prefix: &str, client_code: &str, used: &[String], reusable: &[String]) -> Allocation {
    let reuse = reusable
        .iter()
        .filter_map(|n| parse_sequence(n, prefix, client_code).map(|seq| (seq, n)))
        .min_by_key(|(seq, _)| *seq);
    if let Some((_, number)) = reuse {
        return Allocation::Reused(number.clone());
    }

    let next = used
        .iter()
        .filter_map(|n| parse_sequence(n, prefix, client_code))
        .max()
        .unwrap_or(0)
        + 1;
    Allocation::Fresh(format_number(prefix, client_code, next))
}
