//! 报价定价
//!
//! 项目价格解析 (FREE → HOURLY → 价格方案 → 默认单价) 只在这里实现一次，
//! 报价预览 (PDF 渲染数据)、客户批准重算和开票推导都调用同一套函数。

use crate::models::{BillingMode, Discount, DiscountType, Quote, QuoteItem};
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

/// 余额容差 (分)
///
/// 含税金额反复乘除税率会产生舍入漂移，余额低于 0.10 视为已结清。
pub const BALANCE_TOLERANCE_CENTS: i64 = 10;

/// 开票基数视为零的阈值 (分)
pub const ZERO_BASE_THRESHOLD_CENTS: i64 = 1;

pub fn cents(value: i64) -> BigDecimal {
    BigDecimal::from(value) / BigDecimal::from(100)
}

pub fn balance_tolerance() -> BigDecimal {
    cents(BALANCE_TOLERANCE_CENTS)
}

pub fn zero_base_threshold() -> BigDecimal {
    cents(ZERO_BASE_THRESHOLD_CENTS)
}

/// 四舍五入到分
pub fn round_cents(value: &BigDecimal) -> BigDecimal {
    value.round(2)
}

/// 项目金额
pub fn item_amount(item: &QuoteItem) -> BigDecimal {
    if item.is_free() {
        return BigDecimal::zero();
    }

    if item.billing_mode == BillingMode::Hourly {
        return match (&item.hourly_rate, &item.hours) {
            (Some(rate), Some(hours)) => rate * hours,
            _ => BigDecimal::zero(),
        };
    }

    match item.chosen_variant() {
        Some(variant) => &variant.price * &item.quantity,
        None => &item.unit_price * &item.quantity,
    }
}

/// 项目是否计入报价总额
pub fn counts_toward_total(item: &QuoteItem) -> bool {
    item.include_in_total && !item.is_free() && (!item.is_a_la_carte() || item.is_selected)
}

/// 折扣总额：各折扣独立计算后相加，不叠加复利
pub fn discount_total(subtotal: &BigDecimal, discounts: &[Discount]) -> BigDecimal {
    let hundred = BigDecimal::from(100);
    discounts.iter().fold(BigDecimal::zero(), |acc, discount| {
        let amount = match discount.discount_type {
            DiscountType::Percentage => &(subtotal * &discount.value) / &hundred,
            DiscountType::Fixed => discount.value.clone(),
        };
        acc + amount
    })
}

/// 报价各项金额
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub subtotal: BigDecimal,
    pub total_discount: BigDecimal,
    pub after_discount: BigDecimal,
    pub tps_amount: BigDecimal,
    pub tvq_amount: BigDecimal,
    pub total: BigDecimal,
}

impl QuoteTotals {
    pub fn rounded(&self) -> Self {
        Self {
            subtotal: round_cents(&self.subtotal),
            total_discount: round_cents(&self.total_discount),
            after_discount: round_cents(&self.after_discount),
            tps_amount: round_cents(&self.tps_amount),
            tvq_amount: round_cents(&self.tvq_amount),
            total: round_cents(&self.total),
        }
    }
}

/// 按当前选择计算报价总额
pub fn quote_totals(quote: &Quote) -> QuoteTotals {
    let subtotal = quote
        .items()
        .filter(|item| counts_toward_total(item))
        .fold(BigDecimal::zero(), |acc, item| acc + item_amount(item));

    let total_discount = discount_total(&subtotal, &quote.discounts);
    let mut after_discount = &subtotal - &total_discount;
    if after_discount < BigDecimal::zero() {
        after_discount = BigDecimal::zero();
    }

    let tps_amount = &after_discount * &quote.tps_rate;
    let tvq_amount = &after_discount * &quote.tvq_rate;
    let total = &(&after_discount + &tps_amount) + &tvq_amount;

    QuoteTotals {
        subtotal,
        total_discount,
        after_discount,
        tps_amount,
        tvq_amount,
        total,
    }
}

/// 预览中的单个项目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricedLine {
    pub item_id: i64,
    pub section: String,
    pub title: String,
    pub amount: BigDecimal,
    pub counted: bool,
}

/// 报价预览 (PDF 渲染使用)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotePreview {
    pub quote_id: i64,
    pub number: String,
    pub lines: Vec<PricedLine>,
    pub totals: QuoteTotals,
}

pub fn quote_preview(quote: &Quote) -> QuotePreview {
    let lines = quote
        .sections
        .iter()
        .flat_map(|section| {
            section.items.iter().map(move |item| PricedLine {
                item_id: item.id,
                section: section.title.clone(),
                title: item.title.clone(),
                amount: round_cents(&item_amount(item)),
                counted: counts_toward_total(item),
            })
        })
        .collect();

    QuotePreview {
        quote_id: quote.id,
        number: quote.number.clone(),
        lines,
        totals: quote_totals(quote).rounded(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemType, ItemTypes, Variant};

    fn dec(v: i64) -> BigDecimal {
        BigDecimal::from(v)
    }

    #[test]
    fn free_item_is_zero_even_when_hourly() {
        let item = QuoteItem::hourly(1, "Consult", dec(80), dec(3))
            .with_types(ItemTypes::empty().with(ItemType::Free));
        assert_eq!(item_amount(&item), dec(0));
    }

    #[test]
    fn hourly_ignores_quantity() {
        let mut item = QuoteItem::hourly(1, "Retouching", dec(75), dec(4));
        item.quantity = dec(10);
        assert_eq!(item_amount(&item), dec(300));
    }

    #[test]
    fn selected_variant_overrides_unit_price() {
        let item = QuoteItem::fixed(1, "Prints", dec(2), dec(50)).with_variants(
            vec![
                Variant { label: "Matte".into(), price: dec(60) },
                Variant { label: "Glossy".into(), price: dec(80) },
            ],
            Some(1),
        );
        assert_eq!(item_amount(&item), dec(160));
    }

    #[test]
    fn discounts_do_not_compound() {
        let discounts = vec![
            Discount::percentage(dec(10), "Loyalty"),
            Discount::fixed(dec(5), "Promo"),
        ];
        assert_eq!(discount_total(&dec(100), &discounts), dec(15));
    }

    #[test]
    fn two_percentage_discounts_apply_to_the_same_base() {
        let discounts = vec![
            Discount::percentage(dec(10), "A"),
            Discount::percentage(dec(10), "B"),
        ];
        assert_eq!(discount_total(&dec(100), &discounts), dec(20));
    }

    #[test]
    fn unselected_a_la_carte_and_excluded_items_do_not_count() {
        let mut excluded = QuoteItem::fixed(2, "Excluded", dec(1), dec(999));
        excluded.include_in_total = false;
        let mut optional = QuoteItem::fixed(3, "Option", dec(1), dec(40))
            .with_types(ItemTypes::empty().with(ItemType::ALaCarte));
        optional.is_selected = false;

        assert!(counts_toward_total(&QuoteItem::fixed(1, "Base", dec(1), dec(10))));
        assert!(!counts_toward_total(&excluded));
        assert!(!counts_toward_total(&optional));

        optional.is_selected = true;
        assert!(counts_toward_total(&optional));
    }

    #[test]
    fn tolerances() {
        assert_eq!(balance_tolerance(), "0.10".parse::<BigDecimal>().unwrap());
        assert_eq!(zero_base_threshold(), "0.01".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn round_cents_is_half_up() {
        let v: BigDecimal = "173.9135".parse().unwrap();
        assert_eq!(round_cents(&v), "173.91".parse::<BigDecimal>().unwrap());
        let v: BigDecimal = "0.476".parse().unwrap();
        assert_eq!(round_cents(&v), "0.48".parse::<BigDecimal>().unwrap());
    }
}
