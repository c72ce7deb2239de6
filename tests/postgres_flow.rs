use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{Duration, Utc};
use coupon_service::{
    db::{create_pool, orm_from_pool},
    dto::coupons::{CouponRequest, RecordRedemptionRequest},
    middleware::auth::{ADMIN_ROLE, AuthUser},
    models::{CartItem, Category, DeclineReason, DiscountType, UsageType},
    routes::params::CouponListQuery,
    services::coupon_service::{self as service, ValidateCouponInput},
    store::{Deadline, PgCouponStore},
};
use rust_decimal::Decimal;
use uuid::Uuid;

// Runs against a real database; skipped when none is configured.
async fn setup_store() -> anyhow::Result<Option<PgCouponStore>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run Postgres flow tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, StdDuration::from_secs(5)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Some(PgCouponStore::new(orm_from_pool(pool.clone()), pool)))
}

fn deadline() -> Deadline {
    Deadline::after(StdDuration::from_secs(10))
}

fn unique_code(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn request(code: &str, usage_type: UsageType, max: Option<i32>) -> CouponRequest {
    CouponRequest {
        code: code.to_string(),
        expiry_date: Utc::now() + Duration::days(30),
        usage_type,
        discount_type: DiscountType::Percentage,
        discount_value: Decimal::from(20),
        min_order_value: Decimal::from(100),
        max_usage_per_user: max,
        valid_time_window: None,
        terms_and_conditions: "test coupon".to_string(),
        applicable_products: Vec::new(),
        applicable_categories: Vec::new(),
    }
}

#[tokio::test]
async fn coupon_lifecycle_against_postgres() -> anyhow::Result<()> {
    let Some(store) = setup_store().await? else {
        return Ok(());
    };
    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: ADMIN_ROLE.to_string(),
    };
    let user = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".to_string(),
    };

    let code = unique_code("PAIN");
    let mut payload = request(&code, UsageType::MultiUse, Some(2));
    payload.applicable_categories = vec![Category {
        id: None,
        name: "painkiller".to_string(),
    }];
    let coupon = service::create_coupon(&store, deadline(), &admin, payload, Utc::now())
        .await?
        .data
        .expect("coupon data");

    let fetched = service::get_coupon(&store, deadline(), &admin, coupon.id)
        .await?
        .data
        .expect("coupon data");
    assert_eq!(fetched.eligibility, coupon.eligibility);
    assert_eq!(fetched.discount_value, Decimal::from(20));

    let input = ValidateCouponInput {
        code: code.clone(),
        cart_items: vec![CartItem {
            id: Uuid::new_v4(),
            name: Some("Ibuprofen".to_string()),
            category: "painkiller".to_string(),
            price: Decimal::from(250),
        }],
        order_total: Decimal::new(25050, 2),
        user_id: user.user_id,
        now: Utc::now(),
    };
    let validated = service::validate_coupon(&store, deadline(), input.clone())
        .await?
        .data
        .expect("validation data");
    assert!(validated.valid);
    assert_eq!(validated.items_discount, Decimal::new(5010, 2));

    for expected in [None, None, Some(DeclineReason::LimitExceeded)] {
        let response = service::record_redemption(
            &store,
            deadline(),
            &user,
            RecordRedemptionRequest {
                coupon_id: coupon.id,
                order_id: Uuid::new_v4(),
            },
            Utc::now(),
        )
        .await?
        .data
        .expect("redemption data");
        assert_eq!(response.reason, expected);
    }

    let listed = service::list_coupons(
        &store,
        deadline(),
        &admin,
        CouponListQuery {
            page: Some(1),
            per_page: Some(100),
            status: None,
        },
    )
    .await?;
    assert!(listed.meta.and_then(|m| m.total).unwrap_or(0) >= 1);

    service::deactivate_coupon(&store, deadline(), &admin, coupon.id, Utc::now()).await?;
    let after = service::validate_coupon(&store, deadline(), input)
        .await?
        .data
        .expect("validation data");
    assert_eq!(after.reason, Some(DeclineReason::NotFound));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_one_time_redemptions_record_once() -> anyhow::Result<()> {
    let Some(store) = setup_store().await? else {
        return Ok(());
    };
    let store = Arc::new(store);
    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: ADMIN_ROLE.to_string(),
    };
    let user = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".to_string(),
    };

    let coupon = service::create_coupon(
        store.as_ref(),
        deadline(),
        &admin,
        request(&unique_code("ONCE"), UsageType::OneTime, None),
        Utc::now(),
    )
    .await?
    .data
    .expect("coupon data");
    let coupon_id = coupon.id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            service::record_redemption(
                store.as_ref(),
                deadline(),
                &user,
                RecordRedemptionRequest {
                    coupon_id,
                    order_id: Uuid::new_v4(),
                },
                Utc::now(),
            )
            .await
        }));
    }

    let mut recorded = 0;
    for handle in handles {
        let response = handle.await??.data.expect("redemption data");
        if response.recorded {
            recorded += 1;
        } else {
            assert_eq!(response.reason, Some(DeclineReason::AlreadyUsed));
        }
    }
    assert_eq!(recorded, 1);

    Ok(())
}
