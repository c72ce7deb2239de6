use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    audit::AuditEvent,
    models::{Coupon, CouponStatus, DeclineReason, RedeemOutcome, UsageRecord},
    store::{CouponFilter, CouponStore, StoreError, StoreResult},
};

#[derive(Debug, Default)]
struct Tables {
    coupons: HashMap<Uuid, Coupon>,
    usages: Vec<UsageRecord>,
    audit: Vec<AuditEvent>,
}

impl Tables {
    fn usage_count(&self, coupon_id: Uuid, user_id: Uuid) -> u64 {
        self.usages
            .iter()
            .filter(|u| u.coupon_id == coupon_id && u.user_id == user_id)
            .count() as u64
    }

    fn code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.coupons
            .values()
            .any(|c| c.code == code && Some(c.id) != except)
    }
}

/// In-process store. Every operation runs under a single mutex, which
/// linearizes redemptions for all (coupon, user) pairs.
#[derive(Debug, Default)]
pub struct MemoryCouponStore {
    tables: Mutex<Tables>,
    latency: Option<Duration>,
}

impl MemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency` before touching the tables.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            tables: Mutex::default(),
            latency: Some(latency),
        }
    }

    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.lock().map(|t| t.usages.clone()).unwrap_or_default()
    }

    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.lock().map(|t| t.audit.clone()).unwrap_or_default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CouponStore for MemoryCouponStore {
    async fn find_coupon_by_code(&self, code: &str) -> StoreResult<Option<Coupon>> {
        self.simulate_latency().await;
        let tables = self.lock()?;
        Ok(tables
            .coupons
            .values()
            .find(|c| c.code == code && c.is_active())
            .cloned())
    }

    async fn find_coupon_by_id(&self, id: Uuid) -> StoreResult<Option<Coupon>> {
        self.simulate_latency().await;
        Ok(self.lock()?.coupons.get(&id).cloned())
    }

    async fn list_coupons(&self, filter: &CouponFilter) -> StoreResult<(Vec<Coupon>, u64)> {
        self.simulate_latency().await;
        let tables = self.lock()?;
        let mut matching: Vec<&Coupon> = tables
            .coupons
            .values()
            .filter(|c| filter.status.is_none_or(|status| c.status == status))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(filter.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn list_candidate_coupons(
        &self,
        now: DateTime<Utc>,
        order_total: Decimal,
    ) -> StoreResult<Vec<Coupon>> {
        self.simulate_latency().await;
        let tables = self.lock()?;
        let mut candidates: Vec<Coupon> = tables
            .coupons
            .values()
            .filter(|c| c.is_active() && c.expiry_date >= now && c.min_order_value <= order_total)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date));
        Ok(candidates)
    }

    async fn count_usages(&self, coupon_id: Uuid, user_id: Uuid) -> StoreResult<u64> {
        self.simulate_latency().await;
        Ok(self.lock()?.usage_count(coupon_id, user_id))
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> StoreResult<()> {
        self.simulate_latency().await;
        let mut tables = self.lock()?;
        if tables.code_taken(&coupon.code, None) {
            return Err(StoreError::DuplicateCode(coupon.code.clone()));
        }
        if tables.coupons.contains_key(&coupon.id) {
            return Err(StoreError::Conflict(format!("coupon {} already exists", coupon.id)));
        }
        tables.coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }

    async fn replace_coupon(&self, coupon: &Coupon) -> StoreResult<Option<Coupon>> {
        self.simulate_latency().await;
        let mut tables = self.lock()?;
        if tables.code_taken(&coupon.code, Some(coupon.id)) {
            return Err(StoreError::DuplicateCode(coupon.code.clone()));
        }
        let Some(existing) = tables.coupons.get_mut(&coupon.id) else {
            return Ok(None);
        };
        let created_at = existing.created_at;
        *existing = Coupon {
            created_at,
            ..coupon.clone()
        };
        Ok(Some(existing.clone()))
    }

    async fn set_coupon_status(
        &self,
        id: Uuid,
        status: CouponStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Coupon>> {
        self.simulate_latency().await;
        let mut tables = self.lock()?;
        Ok(tables.coupons.get_mut(&id).map(|coupon| {
            coupon.status = status;
            coupon.updated_at = at;
            coupon.clone()
        }))
    }

    async fn redeem(&self, record: &UsageRecord) -> StoreResult<RedeemOutcome> {
        self.simulate_latency().await;
        let mut tables = self.lock()?;

        let coupon = match tables.coupons.get(&record.coupon_id) {
            Some(coupon) if coupon.is_active() => coupon,
            _ => return Ok(RedeemOutcome::Declined(DeclineReason::NotFound)),
        };
        let prior = tables.usage_count(record.coupon_id, record.user_id);
        if let Err(reason) = coupon.check_usage(prior) {
            return Ok(RedeemOutcome::Declined(reason));
        }

        tables.usages.push(record.clone());
        Ok(RedeemOutcome::Recorded(record.clone()))
    }

    async fn append_audit(&self, event: &AuditEvent) -> StoreResult<()> {
        self.simulate_latency().await;
        self.lock()?.audit.push(event.clone());
        Ok(())
    }
}
