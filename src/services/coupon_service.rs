use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    audit::{AuditAction, AuditEvent},
    dto::coupons::{
        ApplicableCouponsRequest, CouponList, CouponRequest, RecordRedemptionRequest,
        RedemptionResponse, ValidateCouponResponse,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    money::{MAX_MONEY, MONEY_SCALE, is_storable},
    models::{
        CartItem, Coupon, CouponStatus, DiscountType, Eligibility, RedeemOutcome, UsageRecord,
        UsageType,
    },
    response::{ApiResponse, Meta},
    routes::params::CouponListQuery,
    store::{CouponFilter, CouponStore, Deadline},
};

/// Everything needed to decide whether a coupon can be used on a cart.
#[derive(Debug, Clone)]
pub struct ValidateCouponInput {
    pub code: String,
    pub cart_items: Vec<CartItem>,
    pub order_total: Decimal,
    pub user_id: Uuid,
    pub now: DateTime<Utc>,
}

pub async fn create_coupon<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    user: &AuthUser,
    payload: CouponRequest,
    now: DateTime<Utc>,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let coupon = build_coupon(payload, Uuid::new_v4(), CouponStatus::Active, now, now)?;

    deadline.run(store.insert_coupon(&coupon)).await?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "coupon created");

    record_audit(
        store,
        deadline,
        user,
        AuditAction::CouponCreate,
        json!({ "coupon_id": coupon.id, "code": coupon.code }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon created",
        coupon,
        Some(Meta::empty()),
    ))
}

/// Republishes every field of an existing coupon. Lifecycle status and
/// creation time are kept.
pub async fn replace_coupon<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    user: &AuthUser,
    id: Uuid,
    payload: CouponRequest,
    now: DateTime<Utc>,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let existing = deadline.run(store.find_coupon_by_id(id)).await?;
    let existing = match existing {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    let coupon = build_coupon(payload, id, existing.status, existing.created_at, now)?;
    let replaced = deadline.run(store.replace_coupon(&coupon)).await?;
    let replaced = match replaced {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };

    record_audit(
        store,
        deadline,
        user,
        AuditAction::CouponUpdate,
        json!({ "coupon_id": id, "code": replaced.code }),
    )
    .await;

    Ok(ApiResponse::success("Updated", replaced, Some(Meta::empty())))
}

pub async fn deactivate_coupon<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    user: &AuthUser,
    id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let coupon = deadline
        .run(store.set_coupon_status(id, CouponStatus::Deactivated, now))
        .await?;
    let coupon = match coupon {
        Some(c) => c,
        None => return Err(AppError::NotFound),
    };
    tracing::info!(coupon_id = %id, code = %coupon.code, "coupon deactivated");

    record_audit(
        store,
        deadline,
        user,
        AuditAction::CouponDeactivate,
        json!({ "coupon_id": id }),
    )
    .await;

    Ok(ApiResponse::success("Deactivated", coupon, Some(Meta::empty())))
}

pub async fn get_coupon<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let coupon = deadline.run(store.find_coupon_by_id(id)).await?;
    match coupon {
        Some(c) => Ok(ApiResponse::success("Coupon", c, None)),
        None => Err(AppError::NotFound),
    }
}

pub async fn list_coupons<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    user: &AuthUser,
    query: CouponListQuery,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();
    let filter = CouponFilter {
        status: query.status,
        limit: limit as u64,
        offset: offset as u64,
    };

    let (items, total) = deadline.run(store.list_coupons(&filter)).await?;

    let meta = Meta::new(page, limit, total as i64);
    Ok(ApiResponse::success("Coupons", CouponList { items }, Some(meta)))
}

/// Coupons a cart could use right now, without regard to any user's usage.
pub async fn get_applicable_coupons<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    payload: ApplicableCouponsRequest,
    now: DateTime<Utc>,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_order_total(payload.order_total)?;

    let candidates = deadline
        .run(store.list_candidate_coupons(now, payload.order_total))
        .await?;
    let items: Vec<Coupon> = candidates
        .into_iter()
        .filter(|c| c.is_currently_valid(payload.order_total, now))
        .filter(|c| c.is_applicable(&payload.cart_items))
        .collect();

    let meta = Meta::total(items.len());
    Ok(ApiResponse::success(
        "Applicable coupons",
        CouponList { items },
        Some(meta),
    ))
}

/// Decides whether `input.code` can be used and prices it. Declines come
/// back as `valid = false` results. Nothing is recorded here.
pub async fn validate_coupon<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    input: ValidateCouponInput,
) -> AppResult<ApiResponse<ValidateCouponResponse>> {
    if input.code.trim().is_empty() {
        return Err(AppError::BadRequest("coupon_code is required".into()));
    }
    ensure_order_total(input.order_total)?;

    let outcome = evaluate(store, deadline, &input).await?;
    if let Some(reason) = outcome.reason {
        tracing::debug!(
            code = %input.code,
            user_id = %input.user_id,
            reason = ?reason,
            "coupon declined"
        );
    }

    let message = if outcome.valid {
        "Coupon valid"
    } else {
        "Coupon declined"
    };
    Ok(ApiResponse::success(message, outcome, Some(Meta::empty())))
}

async fn evaluate<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    input: &ValidateCouponInput,
) -> AppResult<ValidateCouponResponse> {
    use crate::models::DeclineReason::{Inapplicable, Ineligible, NotFound};

    let coupon = deadline.run(store.find_coupon_by_code(&input.code)).await?;
    let Some(coupon) = coupon else {
        return Ok(ValidateCouponResponse::declined(None, NotFound));
    };

    if !coupon.is_currently_valid(input.order_total, input.now) {
        return Ok(ValidateCouponResponse::declined(Some(coupon.id), Inapplicable));
    }
    if !coupon.is_applicable(&input.cart_items) {
        return Ok(ValidateCouponResponse::declined(Some(coupon.id), Ineligible));
    }

    let prior = deadline
        .run(store.count_usages(coupon.id, input.user_id))
        .await?;
    if let Err(reason) = coupon.check_usage(prior) {
        return Ok(ValidateCouponResponse::declined(Some(coupon.id), reason));
    }

    let discount = coupon
        .compute_discount(input.order_total)
        .ok_or_else(|| AppError::BadRequest("order_total is too large to price".into()))?;
    Ok(ValidateCouponResponse::accepted(coupon.id, discount))
}

/// Consumes one unit of the user's allowance once an order has completed.
pub async fn record_redemption<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    user: &AuthUser,
    payload: RecordRedemptionRequest,
    now: DateTime<Utc>,
) -> AppResult<ApiResponse<RedemptionResponse>> {
    let record = UsageRecord::new(payload.coupon_id, user.user_id, payload.order_id, now);

    let outcome = deadline.run(store.redeem(&record)).await?;
    let response = match outcome {
        RedeemOutcome::Recorded(usage) => {
            tracing::info!(
                coupon_id = %usage.coupon_id,
                user_id = %usage.user_id,
                order_id = %usage.order_id,
                "coupon redeemed"
            );
            record_audit(
                store,
                deadline,
                user,
                AuditAction::CouponRedeem,
                json!({ "coupon_id": usage.coupon_id, "order_id": usage.order_id, "usage_id": usage.id }),
            )
            .await;
            RedemptionResponse {
                recorded: true,
                usage: Some(usage),
                reason: None,
                message: "coupon redemption recorded".to_string(),
            }
        }
        RedeemOutcome::Declined(reason) => {
            tracing::debug!(
                coupon_id = %record.coupon_id,
                user_id = %record.user_id,
                reason = ?reason,
                "redemption declined"
            );
            RedemptionResponse {
                recorded: false,
                usage: None,
                reason: Some(reason),
                message: reason.message().to_string(),
            }
        }
    };

    let message = if response.recorded {
        "Redemption recorded"
    } else {
        "Redemption declined"
    };
    Ok(ApiResponse::success(message, response, Some(Meta::empty())))
}

fn ensure_order_total(order_total: Decimal) -> AppResult<()> {
    if order_total < Decimal::ZERO {
        return Err(AppError::BadRequest(
            "order_total must not be negative".into(),
        ));
    }
    if order_total > MAX_MONEY {
        return Err(AppError::BadRequest(format!(
            "order_total must not exceed {MAX_MONEY}"
        )));
    }
    Ok(())
}

/// Checks publishable fields and assembles the coupon. All problems are
/// reported together.
fn build_coupon(
    payload: CouponRequest,
    id: Uuid,
    status: CouponStatus,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> AppResult<Coupon> {
    let mut problems: Vec<String> = Vec::new();

    if payload.code.trim().is_empty() {
        problems.push("code is required".into());
    }
    if payload.expiry_date <= now {
        problems.push("expiry_date must be in the future".into());
    }
    if payload.discount_value <= Decimal::ZERO {
        problems.push("discount_value must be greater than 0".into());
    }
    if payload.discount_type == DiscountType::Percentage
        && payload.discount_value > Decimal::ONE_HUNDRED
    {
        problems.push("percentage discount_value must not exceed 100".into());
    }
    if payload.min_order_value < Decimal::ZERO {
        problems.push("min_order_value must not be negative".into());
    }
    if !is_storable(payload.discount_value) {
        problems.push(format!(
            "discount_value must have at most {MONEY_SCALE} decimal places and not exceed {MAX_MONEY}"
        ));
    }
    if !is_storable(payload.min_order_value) {
        problems.push(format!(
            "min_order_value must have at most {MONEY_SCALE} decimal places and not exceed {MAX_MONEY}"
        ));
    }

    let max_usage_per_user = match (payload.usage_type, payload.max_usage_per_user) {
        (_, Some(max)) if max < 1 => {
            problems.push("max_usage_per_user must be at least 1".into());
            max
        }
        (_, Some(max)) => max,
        (UsageType::MultiUse, None) => {
            problems.push("max_usage_per_user is required for multi_use coupons".into());
            0
        }
        (_, None) => 1,
    };

    match payload.valid_time_window {
        Some(window) if window.start_time > window.end_time => {
            problems.push("valid_time_window start_time must not be after end_time".into());
        }
        None if payload.usage_type == UsageType::TimeBased => {
            problems.push("valid_time_window is required for time_based coupons".into());
        }
        _ => {}
    }

    if payload.applicable_categories.iter().any(|c| c.name.is_empty()) {
        problems.push("applicable_categories entries need a name".into());
    }

    if !problems.is_empty() {
        return Err(AppError::Validation(problems.join("; ")));
    }

    Ok(Coupon {
        id,
        code: payload.code,
        expiry_date: payload.expiry_date,
        usage_type: payload.usage_type,
        discount_type: payload.discount_type,
        discount_value: payload.discount_value,
        min_order_value: payload.min_order_value,
        max_usage_per_user,
        valid_time_window: payload.valid_time_window,
        terms_and_conditions: payload.terms_and_conditions,
        status,
        eligibility: Eligibility::from_lists(
            payload.applicable_products.into_iter().map(|p| p.id),
            payload.applicable_categories.into_iter().map(|c| c.name),
        ),
        created_at,
        updated_at: now,
    })
}

async fn record_audit<S: CouponStore>(
    store: &S,
    deadline: Deadline,
    user: &AuthUser,
    action: AuditAction,
    metadata: Value,
) {
    let event = AuditEvent::new(Some(user.user_id), action, metadata);
    if let Err(err) = deadline.run(store.append_audit(&event)).await {
        tracing::warn!(error = %err, action = action.as_str(), "audit log failed");
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::models::{Category, TimeWindow};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    fn request() -> CouponRequest {
        CouponRequest {
            code: "SAVE20".into(),
            expiry_date: now() + Duration::days(10),
            usage_type: UsageType::MultiUse,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(20),
            min_order_value: Decimal::from(100),
            max_usage_per_user: Some(5),
            valid_time_window: None,
            terms_and_conditions: String::new(),
            applicable_products: Vec::new(),
            applicable_categories: Vec::new(),
        }
    }

    fn build(payload: CouponRequest) -> AppResult<Coupon> {
        build_coupon(payload, Uuid::new_v4(), CouponStatus::Active, now(), now())
    }

    fn problems(payload: CouponRequest) -> String {
        match build(payload) {
            Err(AppError::Validation(msg)) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_request_builds_active_unrestricted_coupon() {
        let coupon = build(request()).unwrap();
        assert_eq!(coupon.status, CouponStatus::Active);
        assert_eq!(coupon.eligibility, Eligibility::Unrestricted);
        assert_eq!(coupon.max_usage_per_user, 5);
    }

    #[test]
    fn percentage_above_hundred_is_rejected() {
        let mut payload = request();
        payload.discount_value = Decimal::from(150);
        assert!(problems(payload).contains("must not exceed 100"));
    }

    #[test]
    fn fixed_discount_may_exceed_hundred() {
        let mut payload = request();
        payload.discount_type = DiscountType::Fixed;
        payload.discount_value = Decimal::from(150);
        assert!(build(payload).is_ok());
    }

    #[test]
    fn multi_use_requires_limit() {
        let mut payload = request();
        payload.max_usage_per_user = None;
        assert!(problems(payload).contains("max_usage_per_user is required"));
    }

    #[test]
    fn one_time_defaults_limit_to_one() {
        let mut payload = request();
        payload.usage_type = UsageType::OneTime;
        payload.max_usage_per_user = None;
        assert_eq!(build(payload).unwrap().max_usage_per_user, 1);
    }

    #[test]
    fn time_based_requires_ordered_window() {
        let mut payload = request();
        payload.usage_type = UsageType::TimeBased;
        assert!(problems(payload.clone()).contains("valid_time_window is required"));

        payload.valid_time_window = Some(TimeWindow {
            start_time: now() + Duration::hours(5),
            end_time: now(),
        });
        assert!(problems(payload).contains("start_time must not be after end_time"));
    }

    #[test]
    fn problems_are_reported_together() {
        let mut payload = request();
        payload.code = "  ".into();
        payload.expiry_date = now() - Duration::days(1);
        let msg = problems(payload);
        assert!(msg.contains("code is required"));
        assert!(msg.contains("expiry_date must be in the future"));
    }

    #[test]
    fn restriction_lists_become_eligibility() {
        let mut payload = request();
        payload.applicable_categories = vec![Category {
            id: None,
            name: "painkiller".into(),
        }];
        let coupon = build(payload).unwrap();
        assert_eq!(
            coupon.eligibility.categories().collect::<Vec<_>>(),
            vec!["painkiller"]
        );
    }

    #[test]
    fn negative_order_total_is_bad_request() {
        assert!(ensure_order_total(Decimal::from(-1)).is_err());
        assert!(ensure_order_total(Decimal::ZERO).is_ok());
    }

    #[test]
    fn order_total_above_column_limit_is_bad_request() {
        assert!(ensure_order_total(MAX_MONEY).is_ok());
        assert!(matches!(
            ensure_order_total(Decimal::from_scientific("7e28").unwrap()),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn sub_cent_discount_value_is_rejected() {
        let mut payload = request();
        payload.discount_value = "12.345".parse().unwrap();
        assert!(problems(payload).contains("discount_value must have at most 2 decimal places"));

        let mut payload = request();
        payload.discount_value = "0.001".parse().unwrap();
        assert!(problems(payload).contains("discount_value must have at most 2 decimal places"));
    }

    #[test]
    fn min_order_value_beyond_column_is_rejected() {
        let mut payload = request();
        payload.min_order_value = "10000000000".parse().unwrap();
        assert!(problems(payload).contains("min_order_value must have at most 2 decimal places"));
    }

    #[test]
    fn trailing_zero_scale_is_accepted() {
        let mut payload = request();
        payload.discount_value = "12.5000".parse().unwrap();
        assert!(build(payload).is_ok());
    }
}
