use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chrono::Utc;

use crate::{
    dto::coupons::{
        ApplicableCouponsRequest, CouponList, RecordRedemptionRequest, RedemptionResponse,
        ValidateCouponRequest, ValidateCouponResponse,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::coupon_service::{self, ValidateCouponInput},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/applicable", post(applicable_coupons))
        .route("/validate", post(validate_coupon))
        .route("/redemptions", post(record_redemption))
}

#[utoipa::path(
    post,
    path = "/api/coupons/applicable",
    request_body = ApplicableCouponsRequest,
    responses(
        (status = 200, description = "Coupons usable on this cart right now", body = ApiResponse<CouponList>),
        (status = 400, description = "Negative order total"),
        (status = 503, description = "Store unavailable"),
        (status = 504, description = "Store deadline exceeded"),
    ),
    tag = "Coupons"
)]
pub async fn applicable_coupons(
    State(state): State<AppState>,
    Json(payload): Json<ApplicableCouponsRequest>,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let resp =
        coupon_service::get_applicable_coupons(&state.store, state.deadline(), payload, Utc::now())
            .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Validation result; declines have valid = false", body = ApiResponse<ValidateCouponResponse>),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn validate_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ValidateCouponRequest>,
) -> AppResult<Json<ApiResponse<ValidateCouponResponse>>> {
    let input = ValidateCouponInput {
        code: payload.coupon_code,
        cart_items: payload.cart_items,
        order_total: payload.order_total,
        user_id: user.user_id,
        now: Utc::now(),
    };
    let resp = coupon_service::validate_coupon(&state.store, state.deadline(), input).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/coupons/redemptions",
    request_body = RecordRedemptionRequest,
    responses(
        (status = 201, description = "Redemption recorded", body = ApiResponse<RedemptionResponse>),
        (status = 200, description = "Redemption declined (already used, limit reached or coupon gone)", body = ApiResponse<RedemptionResponse>),
        (status = 401, description = "Missing or invalid token"),
        (status = 409, description = "Redemption contended, retry"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn record_redemption(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RecordRedemptionRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<RedemptionResponse>>)> {
    let resp = coupon_service::record_redemption(
        &state.store,
        state.deadline(),
        &user,
        payload,
        Utc::now(),
    )
    .await?;

    let recorded = resp.data.as_ref().is_some_and(|r| r.recorded);
    let status = if recorded {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resp)))
}
