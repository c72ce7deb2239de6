use sea_orm::entity::prelude::*;

use crate::models::{CouponStatus, DiscountType, UsageType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub expiry_date: DateTimeWithTimeZone,
    pub usage_type: UsageType,
    pub discount_type: DiscountType,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub discount_value: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub min_order_value: Decimal,
    pub max_usage_per_user: i32,
    pub window_start: Option<DateTimeWithTimeZone>,
    pub window_end: Option<DateTimeWithTimeZone>,
    pub terms_and_conditions: String,
    pub status: CouponStatus,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::coupon_products::Entity")]
    CouponProducts,
    #[sea_orm(has_many = "super::coupon_categories::Entity")]
    CouponCategories,
    #[sea_orm(has_many = "super::coupon_usages::Entity")]
    CouponUsages,
}

impl Related<super::coupon_products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponProducts.def()
    }
}

impl Related<super::coupon_categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponCategories.def()
    }
}

impl Related<super::coupon_usages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CouponUsages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
