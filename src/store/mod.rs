use std::{future::Future, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    audit::AuditEvent,
    models::{Coupon, CouponStatus, RedeemOutcome, UsageRecord},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryCouponStore;
pub use postgres::PgCouponStore;

/// Redemption attempts before contention is reported as a conflict.
pub const REDEEM_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("coupon code {0} already exists")]
    DuplicateCode(String),

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call exceeded its deadline")]
    Timeout,

    #[error("store query failed: {0}")]
    Query(String),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Point in time by which a store call must finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }

    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Drives `call` until it completes or the deadline passes. The call is
    /// dropped, and therefore cancelled, on expiry.
    pub async fn run<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout_at(self.0, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CouponFilter {
    pub status: Option<CouponStatus>,
    pub limit: u64,
    pub offset: u64,
}

/// Persistence boundary for coupons, their usage ledger and the audit trail.
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Active coupon with exactly this code. Deactivated coupons are `None`.
    async fn find_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>>;

    async fn find_coupon_by_id(&self, id: Uuid) -> StoreResult<Option<Coupon>>;

    /// Page of coupons, newest first, and the total matching the filter.
    async fn list_coupons(&self, filter: &CouponFilter) -> StoreResult<(Vec<Coupon>, u64)>;

    /// Active coupons not expired at `now` whose minimum order is met.
    async fn list_candidate_coupons(
        &self,
        now: DateTime<Utc>,
        order_total: Decimal,
    ) -> StoreResult<Vec<Coupon>>;

    async fn count_usages(&self, coupon_id: Uuid, user_id: Uuid) -> StoreResult<u64>;

    /// Fails with `DuplicateCode` when the code is taken.
    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()>;

    /// Overwrites every field of an existing coupon except `created_at`.
    /// `None` when no coupon has that id.
    async fn replace_coupon(&self, coupon: &Coupon) -> StoreResult<Option<Coupon>>;

    async fn set_coupon_status(
        &self,
        id: Uuid,
        status: CouponStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Coupon>>;

    /// Re-reads the coupon, requires it active, applies the per-user
    /// allowance and appends the record, all as one linearized step per
    /// (coupon, user) pair.
    async fn redeem(&self, record: &UsageRecord) -> StoreResult<RedeemOutcome>;

    async fn append_audit(&self, event: &AuditEvent) -> StoreResult<()>;
}
