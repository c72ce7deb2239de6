use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SqlErr, TransactionTrait,
    ActiveValue::{NotSet, Set},
    sea_query::LockType,
};
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, log_audit},
    db::DbPool,
    entity::{
        coupon_categories::{ActiveModel as CategoryActive, Column as CategoryCol},
        coupon_products::{ActiveModel as ProductActive, Column as ProductCol},
        coupon_usages::{ActiveModel as UsageActive, Column as UsageCol},
        coupons::{ActiveModel as CouponActive, Column as CouponCol, Model as CouponModel},
        CouponCategories, CouponProducts, CouponUsages, Coupons,
    },
    models::{
        Coupon, CouponStatus, DeclineReason, Eligibility, RedeemOutcome, TimeWindow, UsageRecord,
        usage_allowance,
    },
    store::{CouponFilter, CouponStore, REDEEM_ATTEMPTS, StoreError, StoreResult},
};

/// Postgres-backed store. Coupons and the usage ledger go through sea-orm,
/// the audit trail through the shared sqlx pool.
#[derive(Clone)]
pub struct PgCouponStore {
    orm: DatabaseConnection,
    pool: DbPool,
}

impl PgCouponStore {
    pub fn new(orm: DatabaseConnection, pool: DbPool) -> Self {
        Self { orm, pool }
    }

    pub fn orm(&self) -> &DatabaseConnection {
        &self.orm
    }
}

#[async_trait]
impl CouponStore for PgCouponStore {
    async fn find_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let model = Coupons::find()
            .filter(CouponCol::Code.eq(code))
            .filter(CouponCol::Status.eq(CouponStatus::Active))
            .one(&self.orm)
            .await?;
        first_hydrated(&self.orm, model).await
    }

    async fn find_coupon_by_id(&self, id: Uuid) -> StoreResult<Option<Coupon>> {
        let model = Coupons::find_by_id(id).one(&self.orm).await?;
        first_hydrated(&self.orm, model).await
    }

    async fn list_coupons(&self, filter: &CouponFilter) -> StoreResult<(Vec<Coupon>, u64)> {
        let mut finder = Coupons::find();
        if let Some(status) = filter.status {
            finder = finder.filter(CouponCol::Status.eq(status));
        }
        finder = finder.order_by_desc(CouponCol::CreatedAt);

        let total = finder.clone().count(&self.orm).await?;
        let models = finder
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&self.orm)
            .await?;

        Ok((hydrate(&self.orm, models).await?, total))
    }

    async fn list_candidate_coupons(
        &self,
        now: DateTime<Utc>,
        order_total: Decimal,
    ) -> StoreResult<Vec<Coupon>> {
        let models = Coupons::find()
            .filter(CouponCol::Status.eq(CouponStatus::Active))
            .filter(CouponCol::ExpiryDate.gte(now))
            .filter(CouponCol::MinOrderValue.lte(order_total))
            .order_by_asc(CouponCol::ExpiryDate)
            .all(&self.orm)
            .await?;
        Ok(hydrate(&self.orm, models).await?)
    }

    async fn count_usages(&self, coupon_id: Uuid, user_id: Uuid) -> StoreResult<u64> {
        let count = CouponUsages::find()
            .filter(UsageCol::CouponId.eq(coupon_id))
            .filter(UsageCol::UserId.eq(user_id))
            .count(&self.orm)
            .await?;
        Ok(count)
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()> {
        let txn = self.orm.begin().await?;

        if let Err(err) = coupon_to_active(coupon).insert(&txn).await {
            return Err(map_code_conflict(err, &coupon.code));
        }
        insert_eligibility(&txn, coupon).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn replace_coupon(&self, coupon: &Coupon) -> StoreResult<Option<Coupon>> {
        let txn = self.orm.begin().await?;

        let existing = Coupons::find_by_id(coupon.id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let mut active = coupon_to_active(coupon);
        active.created_at = Set(existing.created_at);
        let updated = match active.update(&txn).await {
            Ok(model) => model,
            Err(err) => return Err(map_code_conflict(err, &coupon.code)),
        };

        CouponProducts::delete_many()
            .filter(ProductCol::CouponId.eq(coupon.id))
            .exec(&txn)
            .await?;
        CouponCategories::delete_many()
            .filter(CategoryCol::CouponId.eq(coupon.id))
            .exec(&txn)
            .await?;
        insert_eligibility(&txn, coupon).await?;

        let replaced = first_hydrated(&txn, Some(updated)).await?;
        txn.commit().await?;
        Ok(replaced)
    }

    async fn set_coupon_status(
        &self,
        id: Uuid,
        status: CouponStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Coupon>> {
        let existing = Coupons::find_by_id(id).one(&self.orm).await?;
        let Some(existing) = existing else {
            return Ok(None);
        };

        let mut active: CouponActive = existing.into();
        active.status = Set(status);
        active.updated_at = Set(at.into());
        let updated = active.update(&self.orm).await?;

        first_hydrated(&self.orm, Some(updated)).await
    }

    async fn redeem(&self, record: &UsageRecord) -> StoreResult<RedeemOutcome> {
        for attempt in 1..=REDEEM_ATTEMPTS {
            let txn = self.orm.begin().await?;

            // Shared lock: concurrent redemptions proceed, deactivation waits.
            let coupon = Coupons::find_by_id(record.coupon_id)
                .filter(CouponCol::Status.eq(CouponStatus::Active))
                .lock(LockType::Share)
                .one(&txn)
                .await?;
            let Some(coupon) = coupon else {
                txn.rollback().await?;
                return Ok(RedeemOutcome::Declined(DeclineReason::NotFound));
            };

            let prior = CouponUsages::find()
                .filter(UsageCol::CouponId.eq(record.coupon_id))
                .filter(UsageCol::UserId.eq(record.user_id))
                .count(&txn)
                .await?;

            if let Err(reason) = usage_allowance(coupon.usage_type, coupon.max_usage_per_user, prior) {
                txn.rollback().await?;
                return Ok(RedeemOutcome::Declined(reason));
            }

            let seq = i32::try_from(prior + 1)
                .map_err(|_| StoreError::Query("redemption sequence overflow".into()))?;

            let inserted = UsageActive {
                id: Set(record.id),
                coupon_id: Set(record.coupon_id),
                user_id: Set(record.user_id),
                order_id: Set(record.order_id),
                redemption_seq: Set(seq),
                used_at: Set(record.used_at.into()),
                created_at: NotSet,
            }
            .insert(&txn)
            .await;

            match inserted {
                Ok(_) => {
                    txn.commit().await?;
                    return Ok(RedeemOutcome::Recorded(record.clone()));
                }
                Err(err) if is_unique_violation(&err) => {
                    txn.rollback().await?;
                    tracing::debug!(
                        coupon_id = %record.coupon_id,
                        user_id = %record.user_id,
                        attempt,
                        "redemption slot taken concurrently, re-evaluating"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StoreError::Conflict(format!(
            "redemption of coupon {} still contended after {REDEEM_ATTEMPTS} attempts",
            record.coupon_id
        )))
    }

    async fn append_audit(&self, event: &AuditEvent) -> StoreResult<()> {
        log_audit(&self.pool, event).await
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn map_code_conflict(err: DbErr, code: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::DuplicateCode(code.to_string())
    } else {
        err.into()
    }
}

async fn insert_eligibility<C: ConnectionTrait>(conn: &C, coupon: &Coupon) -> Result<(), DbErr> {
    let products: Vec<ProductActive> = coupon
        .eligibility
        .product_ids()
        .map(|product_id| ProductActive {
            coupon_id: Set(coupon.id),
            product_id: Set(*product_id),
        })
        .collect();
    if !products.is_empty() {
        CouponProducts::insert_many(products)
            .exec_without_returning(conn)
            .await?;
    }

    let categories: Vec<CategoryActive> = coupon
        .eligibility
        .categories()
        .map(|name| CategoryActive {
            coupon_id: Set(coupon.id),
            category_name: Set(name.clone()),
        })
        .collect();
    if !categories.is_empty() {
        CouponCategories::insert_many(categories)
            .exec_without_returning(conn)
            .await?;
    }

    Ok(())
}

async fn load_eligibility<C: ConnectionTrait>(
    conn: &C,
    coupon_ids: &[Uuid],
) -> Result<HashMap<Uuid, Eligibility>, DbErr> {
    if coupon_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let products = CouponProducts::find()
        .filter(ProductCol::CouponId.is_in(coupon_ids.iter().copied()))
        .all(conn)
        .await?;
    let categories = CouponCategories::find()
        .filter(CategoryCol::CouponId.is_in(coupon_ids.iter().copied()))
        .all(conn)
        .await?;

    let mut lists: HashMap<Uuid, (Vec<Uuid>, Vec<String>)> = HashMap::new();
    for row in products {
        lists.entry(row.coupon_id).or_default().0.push(row.product_id);
    }
    for row in categories {
        lists.entry(row.coupon_id).or_default().1.push(row.category_name);
    }

    Ok(lists
        .into_iter()
        .map(|(id, (products, categories))| (id, Eligibility::from_lists(products, categories)))
        .collect())
}

async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    models: Vec<CouponModel>,
) -> Result<Vec<Coupon>, DbErr> {
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
    let mut eligibility = load_eligibility(conn, &ids).await?;

    Ok(models
        .into_iter()
        .map(|model| {
            let scope = eligibility.remove(&model.id).unwrap_or_default();
            coupon_from_entity(model, scope)
        })
        .collect())
}

async fn first_hydrated<C: ConnectionTrait>(
    conn: &C,
    model: Option<CouponModel>,
) -> StoreResult<Option<Coupon>> {
    match model {
        Some(model) => Ok(hydrate(conn, vec![model]).await?.pop()),
        None => Ok(None),
    }
}

fn coupon_from_entity(model: CouponModel, eligibility: Eligibility) -> Coupon {
    let valid_time_window = match (model.window_start, model.window_end) {
        (Some(start), Some(end)) => Some(TimeWindow {
            start_time: start.with_timezone(&Utc),
            end_time: end.with_timezone(&Utc),
        }),
        _ => None,
    };

    Coupon {
        id: model.id,
        code: model.code,
        expiry_date: model.expiry_date.with_timezone(&Utc),
        usage_type: model.usage_type,
        discount_type: model.discount_type,
        discount_value: model.discount_value,
        min_order_value: model.min_order_value,
        max_usage_per_user: model.max_usage_per_user,
        valid_time_window,
        terms_and_conditions: model.terms_and_conditions,
        status: model.status,
        eligibility,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn coupon_to_active(coupon: &Coupon) -> CouponActive {
    CouponActive {
        id: Set(coupon.id),
        code: Set(coupon.code.clone()),
        expiry_date: Set(coupon.expiry_date.into()),
        usage_type: Set(coupon.usage_type),
        discount_type: Set(coupon.discount_type),
        discount_value: Set(coupon.discount_value),
        min_order_value: Set(coupon.min_order_value),
        max_usage_per_user: Set(coupon.max_usage_per_user),
        window_start: Set(coupon.valid_time_window.map(|w| w.start_time.into())),
        window_end: Set(coupon.valid_time_window.map(|w| w.end_time.into())),
        terms_and_conditions: Set(coupon.terms_and_conditions.clone()),
        status: Set(coupon.status),
        created_at: Set(coupon.created_at.into()),
        updated_at: Set(coupon.updated_at.into()),
    }
}
