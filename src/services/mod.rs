pub mod coupon_service;
