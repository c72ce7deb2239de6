use chrono::{Duration, Utc};
use coupon_service::{
    config::AppConfig,
    db::{create_pool, orm_from_pool},
    dto::coupons::CouponRequest,
    error::AppError,
    middleware::auth::{ADMIN_ROLE, AuthUser, issue_token},
    models::{Category, DiscountType, UsageType},
    services::coupon_service as service,
    store::{Deadline, PgCouponStore},
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.store_timeout).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;
    let store = PgCouponStore::new(orm_from_pool(pool.clone()), pool);

    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: ADMIN_ROLE.to_string(),
    };

    for request in sample_coupons() {
        let code = request.code.clone();
        let deadline = Deadline::after(config.store_timeout);
        match service::create_coupon(&store, deadline, &admin, request, Utc::now()).await {
            Ok(response) => {
                let id = response.data.map(|c| c.id.to_string()).unwrap_or_default();
                println!("Seeded coupon {code} ({id})");
            }
            Err(AppError::Conflict(_)) => println!("Coupon {code} already exists, skipped"),
            Err(err) => return Err(anyhow::anyhow!("seeding {code} failed: {err}")),
        }
    }

    let token = issue_token(&config.jwt_secret, admin.user_id, ADMIN_ROLE, Duration::days(7))?;
    println!("Seed completed. Admin token (7 days): {token}");
    Ok(())
}

fn sample_coupons() -> Vec<CouponRequest> {
    let expiry = Utc::now() + Duration::days(90);
    vec![
        CouponRequest {
            code: "SAVE20".into(),
            expiry_date: expiry,
            usage_type: UsageType::MultiUse,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(20),
            min_order_value: Decimal::from(100),
            max_usage_per_user: Some(5),
            valid_time_window: None,
            terms_and_conditions: "20% off orders of 100 or more, up to 5 times".into(),
            applicable_products: Vec::new(),
            applicable_categories: Vec::new(),
        },
        CouponRequest {
            code: "WELCOME50".into(),
            expiry_date: expiry,
            usage_type: UsageType::OneTime,
            discount_type: DiscountType::Fixed,
            discount_value: Decimal::from(50),
            min_order_value: Decimal::ZERO,
            max_usage_per_user: None,
            valid_time_window: None,
            terms_and_conditions: "50 off your first order".into(),
            applicable_products: Vec::new(),
            applicable_categories: Vec::new(),
        },
        CouponRequest {
            code: "PAINFREE10".into(),
            expiry_date: expiry,
            usage_type: UsageType::MultiUse,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(10),
            min_order_value: Decimal::ZERO,
            max_usage_per_user: Some(3),
            valid_time_window: None,
            terms_and_conditions: "10% off carts with painkillers".into(),
            applicable_products: Vec::new(),
            applicable_categories: vec![Category {
                id: None,
                name: "painkiller".into(),
            }],
        },
    ]
}
