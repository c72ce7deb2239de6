use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    dto::coupons::{CouponList, CouponRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Coupon,
    response::ApiResponse,
    routes::params::CouponListQuery,
    services::coupon_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route("/coupons/{id}", get(get_coupon).put(replace_coupon))
        .route("/coupons/{id}/deactivate", post(deactivate_coupon))
}

#[utoipa::path(
    post,
    path = "/api/admin/coupons",
    request_body = CouponRequest,
    responses(
        (status = 201, description = "Create coupon", body = ApiResponse<Coupon>),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Coupon code already exists"),
        (status = 422, description = "Invalid coupon fields"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CouponRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Coupon>>)> {
    let resp =
        coupon_service::create_coupon(&state.store, state.deadline(), &user, payload, Utc::now())
            .await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/admin/coupons",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status: active, deactivated")
    ),
    responses(
        (status = 200, description = "List coupons (admin only)", body = ApiResponse<CouponList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CouponListQuery>,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let resp = coupon_service::list_coupons(&state.store, state.deadline(), &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/coupons/{id}",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    responses(
        (status = 200, description = "Get coupon", body = ApiResponse<Coupon>),
        (status = 404, description = "Not Found"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::get_coupon(&state.store, state.deadline(), &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/admin/coupons/{id}",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    request_body = CouponRequest,
    responses(
        (status = 200, description = "Republish coupon fields", body = ApiResponse<Coupon>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Coupon code already exists"),
        (status = 422, description = "Invalid coupon fields"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn replace_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp = coupon_service::replace_coupon(
        &state.store,
        state.deadline(),
        &user,
        id,
        payload,
        Utc::now(),
    )
    .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/coupons/{id}/deactivate",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    responses(
        (status = 200, description = "Deactivate coupon", body = ApiResponse<Coupon>),
        (status = 404, description = "Not Found"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn deactivate_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    let resp =
        coupon_service::deactivate_coupon(&state.store, state.deadline(), &user, id, Utc::now())
            .await?;
    Ok(Json(resp))
}
