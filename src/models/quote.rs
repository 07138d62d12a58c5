use crate::error::BillingError;
use bigdecimal::{BigDecimal, One, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 报价状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::Sent => "SENT",
            QuoteStatus::Viewed => "VIEWED",
            QuoteStatus::Accepted => "ACCEPTED",
            QuoteStatus::Rejected => "REJECTED",
            QuoteStatus::Expired => "EXPIRED",
        }
    }

    /// 客户只能批准已发送或已查看的报价
    pub fn is_approvable(&self) -> bool {
        matches!(self, QuoteStatus::Sent | QuoteStatus::Viewed)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(QuoteStatus::Draft),
            "SENT" => Ok(QuoteStatus::Sent),
            "VIEWED" => Ok(QuoteStatus::Viewed),
            "ACCEPTED" => Ok(QuoteStatus::Accepted),
            "REJECTED" => Ok(QuoteStatus::Rejected),
            "EXPIRED" => Ok(QuoteStatus::Expired),
            other => Err(BillingError::InvalidData(format!("unknown quote status '{}'", other))),
        }
    }
}

/// 报价项目标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Service,
    Product,
    Free,
    ALaCarte,
}

impl ItemType {
    pub const ALL: [ItemType; 4] = [
        ItemType::Service,
        ItemType::Product,
        ItemType::Free,
        ItemType::ALaCarte,
    ];

    fn bit(self) -> u8 {
        match self {
            ItemType::Service => 1,
            ItemType::Product => 1 << 1,
            ItemType::Free => 1 << 2,
            ItemType::ALaCarte => 1 << 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Service => "SERVICE",
            ItemType::Product => "PRODUCT",
            ItemType::Free => "FREE",
            ItemType::ALaCarte => "A_LA_CARTE",
        }
    }
}

impl FromStr for ItemType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SERVICE" => Ok(ItemType::Service),
            "PRODUCT" => Ok(ItemType::Product),
            "FREE" => Ok(ItemType::Free),
            "A_LA_CARTE" => Ok(ItemType::ALaCarte),
            other => Err(BillingError::InvalidData(format!("unknown item type '{}'", other))),
        }
    }
}

/// 项目标签集合 (位集合，只做成员判断)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ItemType>", into = "Vec<ItemType>")]
pub struct ItemTypes(u8);

impl ItemTypes {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, item_type: ItemType) -> Self {
        self.insert(item_type);
        self
    }

    pub fn insert(&mut self, item_type: ItemType) {
        self.0 |= item_type.bit();
    }

    pub fn contains(&self, item_type: ItemType) -> bool {
        self.0 & item_type.bit() != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemType> + '_ {
        ItemType::ALL.into_iter().filter(|t| self.contains(*t))
    }

    /// 从数据库 TEXT[] 列解析
    pub fn parse_all<S: AsRef<str>>(values: &[S]) -> Result<Self, BillingError> {
        let mut types = Self::empty();
        for value in values {
            types.insert(value.as_ref().parse()?);
        }
        Ok(types)
    }

}

impl FromIterator<ItemType> for ItemTypes {
    fn from_iter<I: IntoIterator<Item = ItemType>>(iter: I) -> Self {
        let mut types = Self::empty();
        for t in iter {
            types.insert(t);
        }
        types
    }
}

impl From<Vec<ItemType>> for ItemTypes {
    fn from(values: Vec<ItemType>) -> Self {
        values.into_iter().collect()
    }
}

impl From<ItemTypes> for Vec<ItemType> {
    fn from(types: ItemTypes) -> Self {
        types.iter().collect()
    }
}

/// 计费方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingMode {
    Fixed,
    Hourly,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Fixed => "FIXED",
            BillingMode::Hourly => "HOURLY",
        }
    }
}

impl FromStr for BillingMode {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIXED" => Ok(BillingMode::Fixed),
            "HOURLY" => Ok(BillingMode::Hourly),
            other => Err(BillingError::InvalidData(format!("unknown billing mode '{}'", other))),
        }
    }
}

/// 项目的可选价格方案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub label: String,
    pub price: BigDecimal,
}

/// 报价项目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: i64,
    pub title: String,
    pub item_types: ItemTypes,
    pub billing_mode: BillingMode,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub hourly_rate: Option<BigDecimal>,
    pub hours: Option<BigDecimal>,
    pub include_in_total: bool,
    pub is_selected: bool,
    pub variants: Vec<Variant>,
    pub selected_variant: Option<usize>,
}

impl QuoteItem {
    /// 固定价格项目，数量 × 单价
    pub fn fixed(id: i64, title: &str, quantity: BigDecimal, unit_price: BigDecimal) -> Self {
        Self {
            id,
            title: title.to_string(),
            item_types: ItemTypes::empty().with(ItemType::Service),
            billing_mode: BillingMode::Fixed,
            quantity,
            unit_price,
            hourly_rate: None,
            hours: None,
            include_in_total: true,
            is_selected: true,
            variants: Vec::new(),
            selected_variant: None,
        }
    }

    /// 按小时计费项目
    pub fn hourly(id: i64, title: &str, hourly_rate: BigDecimal, hours: BigDecimal) -> Self {
        Self {
            billing_mode: BillingMode::Hourly,
            hourly_rate: Some(hourly_rate),
            hours: Some(hours),
            quantity: BigDecimal::one(),
            unit_price: BigDecimal::zero(),
            ..Self::fixed(id, title, BigDecimal::one(), BigDecimal::zero())
        }
    }

    pub fn with_types(mut self, item_types: ItemTypes) -> Self {
        self.item_types = item_types;
        self
    }

    pub fn with_variants(mut self, variants: Vec<Variant>, selected: Option<usize>) -> Self {
        self.variants = variants;
        self.selected_variant = selected;
        self
    }

    pub fn is_free(&self) -> bool {
        self.item_types.contains(ItemType::Free)
    }

    pub fn is_a_la_carte(&self) -> bool {
        self.item_types.contains(ItemType::ALaCarte)
    }

    /// 当前选中的价格方案 (索引越界视为未选择)
    pub fn chosen_variant(&self) -> Option<&Variant> {
        self.selected_variant.and_then(|idx| self.variants.get(idx))
    }
}

/// 报价分组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub title: String,
    pub items: Vec<QuoteItem>,
}

/// 折扣类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl FromStr for DiscountType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERCENTAGE" => Ok(DiscountType::Percentage),
            "FIXED" => Ok(DiscountType::Fixed),
            other => Err(BillingError::InvalidData(format!("unknown discount type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub discount_type: DiscountType,
    pub value: BigDecimal,
    pub label: String,
    pub reason: Option<String>,
}

impl Discount {
    pub fn percentage(value: BigDecimal, label: &str) -> Self {
        Self {
            discount_type: DiscountType::Percentage,
            value,
            label: label.to_string(),
            reason: None,
        }
    }

    pub fn fixed(value: BigDecimal, label: &str) -> Self {
        Self {
            discount_type: DiscountType::Fixed,
            value,
            label: label.to_string(),
            reason: None,
        }
    }
}

/// 报价 (devis)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub project_id: i64,
    pub number: String,
    pub status: QuoteStatus,
    /// 折扣前、税前小计
    pub subtotal: BigDecimal,
    /// 含税总额
    pub total: BigDecimal,
    pub tps_rate: BigDecimal,
    pub tvq_rate: BigDecimal,
    /// 订金百分比 (0-100)
    pub deposit_percent: BigDecimal,
    pub discounts: Vec<Discount>,
    pub sections: Vec<Section>,
}

impl Quote {
    /// 所有项目，按分组顺序
    pub fn items(&self) -> impl Iterator<Item = &QuoteItem> {
        self.sections.iter().flat_map(|s| s.items.iter())
    }

    pub fn item_mut(&mut self, item_id: i64) -> Option<&mut QuoteItem> {
        self.sections
            .iter_mut()
            .flat_map(|s| s.items.iter_mut())
            .find(|item| item.id == item_id)
    }

    /// 1 + TPS + TVQ
    pub fn tax_multiplier(&self) -> BigDecimal {
        &(&BigDecimal::one() + &self.tps_rate) + &self.tvq_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_types_membership() {
        let types = ItemTypes::empty().with(ItemType::Free).with(ItemType::ALaCarte);
        assert!(types.contains(ItemType::Free));
        assert!(types.contains(ItemType::ALaCarte));
        assert!(!types.contains(ItemType::Service));
        assert_eq!(
            types.iter().collect::<Vec<_>>(),
            vec![ItemType::Free, ItemType::ALaCarte]
        );
    }

    #[test]
    fn item_types_parse_rejects_unknown_tag() {
        assert!(ItemTypes::parse_all(&["SERVICE", "PRODUCT"]).is_ok());
        assert!(matches!(
            ItemTypes::parse_all(&["GIFT"]),
            Err(BillingError::InvalidData(_))
        ));
    }

    #[test]
    fn item_types_serialize_as_tag_list() {
        let types = ItemTypes::empty().with(ItemType::Product);
        let json = serde_json::to_string(&types).unwrap();
        assert_eq!(json, r#"["PRODUCT"]"#);
        let back: ItemTypes = serde_json::from_str(r#"["A_LA_CARTE","SERVICE"]"#).unwrap();
        assert!(back.contains(ItemType::ALaCarte));
        assert!(back.contains(ItemType::Service));
    }

    #[test]
    fn out_of_range_variant_is_ignored() {
        let item = QuoteItem::fixed(1, "Logo", BigDecimal::one(), BigDecimal::from(100))
            .with_variants(
                vec![Variant { label: "Basic".into(), price: BigDecimal::from(60) }],
                Some(3),
            );
        assert!(item.chosen_variant().is_none());
    }

    #[test]
    fn approvable_statuses() {
        assert!(QuoteStatus::Sent.is_approvable());
        assert!(QuoteStatus::Viewed.is_approvable());
        assert!(!QuoteStatus::Accepted.is_approvable());
        assert!(!QuoteStatus::Draft.is_approvable());
    }
}
