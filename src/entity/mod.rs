pub mod coupon_categories;
pub mod coupon_products;
pub mod coupon_usages;
pub mod coupons;

pub use coupon_categories::Entity as CouponCategories;
pub use coupon_products::Entity as CouponProducts;
pub use coupon_usages::Entity as CouponUsages;
pub use coupons::Entity as Coupons;
