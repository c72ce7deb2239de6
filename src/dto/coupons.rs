use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{
    CartItem, Category, Coupon, DeclineReason, DiscountType, TimeWindow, UsageRecord, UsageType,
};

/// Product named by an eligibility list. Only `id` is used for matching;
/// the remaining fields are accepted so catalogue objects can be sent as-is.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProductRef {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// Full set of publishable coupon fields, used for creation and for
/// republishing an existing coupon.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CouponRequest {
    pub code: String,
    pub expiry_date: DateTime<Utc>,
    pub usage_type: UsageType,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_order_value: Decimal,
    /// Required for `multi_use`; defaults to 1 otherwise.
    #[serde(default)]
    pub max_usage_per_user: Option<i32>,
    /// Required for `time_based`.
    #[serde(default)]
    pub valid_time_window: Option<TimeWindow>,
    #[serde(default)]
    pub terms_and_conditions: String,
    #[serde(default)]
    pub applicable_products: Vec<ProductRef>,
    #[serde(default)]
    pub applicable_categories: Vec<Category>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApplicableCouponsRequest {
    pub cart_items: Vec<CartItem>,
    pub order_total: Decimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ValidateCouponRequest {
    pub coupon_code: String,
    pub cart_items: Vec<CartItem>,
    pub order_total: Decimal,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecordRedemptionRequest {
    pub coupon_id: Uuid,
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct CouponList {
    #[schema(value_type = Vec<Coupon>)]
    pub items: Vec<Coupon>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ValidateCouponResponse {
    pub valid: bool,
    pub coupon_id: Option<Uuid>,
    pub items_discount: Decimal,
    /// Reserved for delivery-fee discounts; always zero today.
    pub charges_discount: Decimal,
    pub reason: Option<DeclineReason>,
    pub message: String,
}

impl ValidateCouponResponse {
    pub fn accepted(coupon_id: Uuid, items_discount: Decimal) -> Self {
        Self {
            valid: true,
            coupon_id: Some(coupon_id),
            items_discount,
            charges_discount: Decimal::ZERO,
            reason: None,
            message: "coupon applied successfully".to_string(),
        }
    }

    pub fn declined(coupon_id: Option<Uuid>, reason: DeclineReason) -> Self {
        Self {
            valid: false,
            coupon_id,
            items_discount: Decimal::ZERO,
            charges_discount: Decimal::ZERO,
            reason: Some(reason),
            message: reason.message().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RedemptionResponse {
    pub recorded: bool,
    pub usage: Option<UsageRecord>,
    pub reason: Option<DeclineReason>,
    pub message: String,
}
