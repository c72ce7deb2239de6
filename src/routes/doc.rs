use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::coupons::{
        ApplicableCouponsRequest, CouponList, CouponRequest, ProductRef, RecordRedemptionRequest,
        RedemptionResponse, ValidateCouponRequest, ValidateCouponResponse,
    },
    models::{
        CartItem, Category, Coupon, CouponStatus, DeclineReason, DiscountType, Eligibility,
        TimeWindow, UsageRecord, UsageType,
    },
    response::{ApiResponse, Meta},
    routes::{admin, coupons, health},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness_check,
        coupons::applicable_coupons,
        coupons::validate_coupon,
        coupons::record_redemption,
        admin::create_coupon,
        admin::list_coupons,
        admin::get_coupon,
        admin::replace_coupon,
        admin::deactivate_coupon
    ),
    components(
        schemas(
            Coupon,
            CouponStatus,
            UsageType,
            DiscountType,
            TimeWindow,
            Eligibility,
            CartItem,
            Category,
            UsageRecord,
            DeclineReason,
            ProductRef,
            CouponRequest,
            ApplicableCouponsRequest,
            ValidateCouponRequest,
            ValidateCouponResponse,
            RecordRedemptionRequest,
            RedemptionResponse,
            CouponList,
            Meta,
            ApiResponse<Coupon>,
            ApiResponse<CouponList>,
            ApiResponse<ValidateCouponResponse>,
            ApiResponse<RedemptionResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Coupons", description = "Cart-facing coupon endpoints"),
        (name = "Admin", description = "Coupon administration endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
