//! 客户批准报价：应用à-la-carte/价格方案选择并重算报价总额

use crate::error::{BillingError, BillingResult};
use crate::models::{Quote, QuoteStatus};
use crate::service::pricing::{quote_totals, round_cents, QuoteTotals};
use std::collections::HashMap;

/// 报价必须处于 SENT 或 VIEWED
pub fn ensure_approvable(quote: &Quote) -> BillingResult<()> {
    if quote.status.is_approvable() {
        Ok(())
    } else {
        Err(BillingError::InvalidState(format!(
            "quote {} cannot be approved while {}",
            quote.number, quote.status
        )))
    }
}

/// 把客户选择写到报价项目上
///
/// 先校验全部选择再修改，任何一项无效时报价保持不变。
pub fn apply_selections(
    quote: &mut Quote,
    item_selections: &HashMap<i64, bool>,
    variant_selections: &HashMap<i64, usize>,
) -> BillingResult<()> {
    for item_id in item_selections.keys() {
        if quote.item_mut(*item_id).is_none() {
            return Err(BillingError::NotFound(format!("quote item {}", item_id)));
        }
    }
    for (item_id, index) in variant_selections {
        let item = quote
            .item_mut(*item_id)
            .ok_or_else(|| BillingError::NotFound(format!("quote item {}", item_id)))?;
        if *index >= item.variants.len() {
            return Err(BillingError::InvalidSelection(format!(
                "item {} has {} variants, cannot select #{}",
                item_id,
                item.variants.len(),
                index
            )));
        }
    }

    for (item_id, selected) in item_selections {
        if let Some(item) = quote.item_mut(*item_id) {
            item.is_selected = *selected;
        }
    }
    for (item_id, index) in variant_selections {
        if let Some(item) = quote.item_mut(*item_id) {
            item.selected_variant = Some(*index);
        }
    }

    Ok(())
}

/// 重算报价并标记为 ACCEPTED
pub fn finalize_approval(quote: &mut Quote) -> BillingResult<QuoteTotals> {
    ensure_approvable(quote)?;

    let totals = quote_totals(quote);
    quote.subtotal = round_cents(&totals.subtotal);
    quote.total = round_cents(&totals.total);
    quote.status = QuoteStatus::Accepted;

    tracing::debug!(
        "Quote {}: approved, subtotal {}, total {}",
        quote.number,
        quote.subtotal,
        quote.total
    );

    Ok(totals)
}

/// 批准入口：校验状态 → 应用选择 → 重算
pub fn recompute_quote_total(
    quote: &mut Quote,
    item_selections: &HashMap<i64, bool>,
    variant_selections: &HashMap<i64, usize>,
) -> BillingResult<QuoteTotals> {
    ensure_approvable(quote)?;
    apply_selections(quote, item_selections, variant_selections)?;
    finalize_approval(quote)
}
