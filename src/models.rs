use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::money::round_money;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum UsageType {
    #[sea_orm(string_value = "one_time")]
    OneTime,
    #[sea_orm(string_value = "multi_use")]
    MultiUse,
    #[sea_orm(string_value = "time_based")]
    TimeBased,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum DiscountType {
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "fixed")]
    Fixed,
}

/// Lifecycle of a coupon. Coupons are never hard-deleted; a deactivated
/// coupon behaves as unknown on every redemption path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum CouponStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "deactivated")]
    Deactivated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TimeWindow {
    /// Both bounds are inclusive.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_time <= at && at <= self.end_time
    }
}

/// Which carts a coupon applies to.
///
/// `Unrestricted` is the only way to express "applies to everything"; a
/// `Restricted` value always carries at least one product id or category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Eligibility {
    #[default]
    Unrestricted,
    Restricted {
        #[schema(value_type = Vec<Uuid>)]
        product_ids: BTreeSet<Uuid>,
        #[schema(value_type = Vec<String>)]
        categories: BTreeSet<String>,
    },
}

impl Eligibility {
    /// Builds eligibility from restriction lists. Two empty lists mean the
    /// coupon is unrestricted.
    pub fn from_lists(
        product_ids: impl IntoIterator<Item = Uuid>,
        categories: impl IntoIterator<Item = String>,
    ) -> Self {
        let product_ids: BTreeSet<Uuid> = product_ids.into_iter().collect();
        let categories: BTreeSet<String> = categories.into_iter().collect();
        if product_ids.is_empty() && categories.is_empty() {
            Eligibility::Unrestricted
        } else {
            Eligibility::Restricted {
                product_ids,
                categories,
            }
        }
    }

    /// True when at least one cart line matches by product id or by exact
    /// category name. No case folding or trimming is applied.
    pub fn matches(&self, cart: &[CartItem]) -> bool {
        match self {
            Eligibility::Unrestricted => true,
            Eligibility::Restricted {
                product_ids,
                categories,
            } => cart
                .iter()
                .any(|item| product_ids.contains(&item.id) || categories.contains(&item.category)),
        }
    }

    pub fn product_ids(&self) -> impl Iterator<Item = &Uuid> {
        let ids = match self {
            Eligibility::Unrestricted => None,
            Eligibility::Restricted { product_ids, .. } => Some(product_ids.iter()),
        };
        ids.into_iter().flatten()
    }

    pub fn categories(&self) -> impl Iterator<Item = &String> {
        let names = match self {
            Eligibility::Unrestricted => None,
            Eligibility::Restricted { categories, .. } => Some(categories.iter()),
        };
        names.into_iter().flatten()
    }
}

/// A cart line as handed over by checkout. Read-only for this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    pub category: String,
    #[serde(default)]
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub expiry_date: DateTime<Utc>,
    pub usage_type: UsageType,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_value: Decimal,
    pub max_usage_per_user: i32,
    pub valid_time_window: Option<TimeWindow>,
    pub terms_and_conditions: String,
    pub status: CouponStatus,
    pub eligibility: Eligibility,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_active(&self) -> bool {
        self.status == CouponStatus::Active
    }

    /// Active, not past expiry (the expiry instant itself is still valid),
    /// order total meets the minimum, and `now` lies inside the time window
    /// when one is set.
    pub fn is_currently_valid(&self, order_total: Decimal, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        if now > self.expiry_date {
            return false;
        }
        if order_total < self.min_order_value {
            return false;
        }
        match &self.valid_time_window {
            Some(window) => window.contains(now),
            None => true,
        }
    }

    /// Item discount for an order total. Fixed discounts are not capped at
    /// the order total. `None` when the product overflows `Decimal`.
    pub fn compute_discount(&self, order_total: Decimal) -> Option<Decimal> {
        match self.discount_type {
            DiscountType::Percentage => order_total
                .checked_mul(self.discount_value)
                .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
                .map(round_money),
            DiscountType::Fixed => Some(self.discount_value),
        }
    }

    pub fn is_applicable(&self, cart: &[CartItem]) -> bool {
        self.eligibility.matches(cart)
    }

    pub fn check_usage(&self, prior_usages: u64) -> Result<(), DeclineReason> {
        usage_allowance(self.usage_type, self.max_usage_per_user, prior_usages)
    }
}

/// Decides whether one more redemption fits the per-user allowance.
///
/// Time-based coupons carry no per-user limit.
pub fn usage_allowance(
    usage_type: UsageType,
    max_usage_per_user: i32,
    prior_usages: u64,
) -> Result<(), DeclineReason> {
    match usage_type {
        UsageType::OneTime if prior_usages > 0 => Err(DeclineReason::AlreadyUsed),
        UsageType::MultiUse if prior_usages >= u64::try_from(max_usage_per_user).unwrap_or(0) => {
            Err(DeclineReason::LimitExceeded)
        }
        _ => Ok(()),
    }
}

/// Append-only record of one redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UsageRecord {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub used_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(coupon_id: Uuid, user_id: Uuid, order_id: Uuid, used_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            coupon_id,
            user_id,
            order_id,
            used_at,
        }
    }
}

/// Why a coupon was declined. Declines are ordinary results, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    NotFound,
    Inapplicable,
    Ineligible,
    AlreadyUsed,
    LimitExceeded,
}

impl DeclineReason {
    pub fn message(&self) -> &'static str {
        match self {
            DeclineReason::NotFound => "coupon not found",
            DeclineReason::Inapplicable => "coupon is not valid for this order",
            DeclineReason::Ineligible => "coupon is not applicable to any items in cart",
            DeclineReason::AlreadyUsed => "one-time coupon already used",
            DeclineReason::LimitExceeded => "coupon usage limit exceeded",
        }
    }
}

/// Result of an attempted redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    Recorded(UsageRecord),
    Declined(DeclineReason),
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn dec(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn coupon(discount_type: DiscountType, value: Decimal) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "TEST".into(),
            expiry_date: now() + Duration::days(30),
            usage_type: UsageType::MultiUse,
            discount_type,
            discount_value: value,
            min_order_value: dec("100"),
            max_usage_per_user: 2,
            valid_time_window: None,
            terms_and_conditions: String::new(),
            status: CouponStatus::Active,
            eligibility: Eligibility::Unrestricted,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn item(category: &str) -> CartItem {
        CartItem {
            id: Uuid::new_v4(),
            name: None,
            category: category.into(),
            price: dec("10"),
        }
    }

    #[test]
    fn deactivated_coupon_is_never_valid() {
        let mut c = coupon(DiscountType::Fixed, dec("50"));
        c.status = CouponStatus::Deactivated;
        assert!(!c.is_currently_valid(dec("1000"), now()));
        c.min_order_value = Decimal::ZERO;
        assert!(!c.is_currently_valid(dec("0"), now()));
    }

    #[test]
    fn order_below_minimum_is_invalid() {
        let c = coupon(DiscountType::Fixed, dec("50"));
        assert!(!c.is_currently_valid(dec("99.99"), now()));
        assert!(c.is_currently_valid(dec("100"), now()));
    }

    #[test]
    fn expiry_instant_is_still_valid() {
        let c = coupon(DiscountType::Fixed, dec("50"));
        assert!(c.is_currently_valid(dec("200"), c.expiry_date));
        assert!(!c.is_currently_valid(dec("200"), c.expiry_date + Duration::seconds(1)));
    }

    #[test]
    fn time_window_bounds_are_inclusive() {
        let mut c = coupon(DiscountType::Fixed, dec("50"));
        c.valid_time_window = Some(TimeWindow {
            start_time: now(),
            end_time: now() + Duration::hours(2),
        });
        assert!(c.is_currently_valid(dec("200"), now()));
        assert!(c.is_currently_valid(dec("200"), now() + Duration::hours(2)));
        assert!(!c.is_currently_valid(dec("200"), now() - Duration::seconds(1)));
        assert!(!c.is_currently_valid(dec("200"), now() + Duration::hours(3)));
    }

    #[test]
    fn percentage_discount_of_order_total() {
        let c = coupon(DiscountType::Percentage, dec("20"));
        assert_eq!(c.compute_discount(dec("700")), Some(dec("140")));
    }

    #[test]
    fn percentage_discount_rounds_to_cents() {
        let c = coupon(DiscountType::Percentage, dec("15"));
        assert_eq!(c.compute_discount(dec("33.33")), Some(dec("5.00")));
        assert_eq!(c.compute_discount(dec("0.10")), Some(dec("0.02")));
    }

    #[test]
    fn percentage_discount_overflow_is_none() {
        let c = coupon(DiscountType::Percentage, dec("20"));
        assert_eq!(c.compute_discount(dec("70000000000000000000000000000")), None);
    }

    #[test]
    fn fixed_discount_ignores_order_total() {
        let c = coupon(DiscountType::Fixed, dec("50"));
        assert_eq!(c.compute_discount(dec("700")), Some(dec("50")));
        assert_eq!(c.compute_discount(dec("20")), Some(dec("50")));
    }

    #[test]
    fn unrestricted_coupon_matches_any_cart() {
        let c = coupon(DiscountType::Fixed, dec("50"));
        assert!(c.is_applicable(&[item("vitamins")]));
        assert!(c.is_applicable(&[item("painkiller"), item("bandage")]));
    }

    #[test]
    fn category_restriction_needs_matching_line() {
        let mut c = coupon(DiscountType::Fixed, dec("50"));
        c.eligibility = Eligibility::from_lists([], ["painkiller".to_string()]);
        assert!(c.is_applicable(&[item("vitamins"), item("painkiller")]));
        assert!(!c.is_applicable(&[item("vitamins")]));
        assert!(!c.is_applicable(&[item("Painkiller")]));
        assert!(!c.is_applicable(&[]));
    }

    #[test]
    fn product_restriction_matches_by_id() {
        let wanted = item("vitamins");
        let mut c = coupon(DiscountType::Fixed, dec("50"));
        c.eligibility = Eligibility::from_lists([wanted.id], []);
        assert!(c.is_applicable(&[item("other"), wanted.clone()]));
        assert!(!c.is_applicable(&[item("vitamins")]));
    }

    #[test]
    fn empty_lists_collapse_to_unrestricted() {
        assert_eq!(
            Eligibility::from_lists(Vec::<Uuid>::new(), Vec::<String>::new()),
            Eligibility::Unrestricted
        );
    }

    #[test]
    fn one_time_allows_only_first_use() {
        assert_eq!(usage_allowance(UsageType::OneTime, 1, 0), Ok(()));
        assert_eq!(
            usage_allowance(UsageType::OneTime, 5, 1),
            Err(DeclineReason::AlreadyUsed)
        );
    }

    #[test]
    fn multi_use_stops_at_limit() {
        assert_eq!(usage_allowance(UsageType::MultiUse, 2, 1), Ok(()));
        assert_eq!(
            usage_allowance(UsageType::MultiUse, 2, 2),
            Err(DeclineReason::LimitExceeded)
        );
    }

    #[test]
    fn time_based_has_no_per_user_limit() {
        assert_eq!(usage_allowance(UsageType::TimeBased, 1, 40), Ok(()));
    }
}
