use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, store::StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    CouponCreate,
    CouponUpdate,
    CouponDeactivate,
    CouponRedeem,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CouponCreate => "coupon_create",
            AuditAction::CouponUpdate => "coupon_update",
            AuditAction::CouponDeactivate => "coupon_deactivate",
            AuditAction::CouponRedeem => "coupon_redeem",
        }
    }

    pub fn resource(&self) -> &'static str {
        match self {
            AuditAction::CouponRedeem => "coupon_usages",
            _ => "coupons",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub metadata: Value,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(user_id: Option<Uuid>, action: AuditAction, metadata: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            action,
            metadata,
            at: Utc::now(),
        }
    }
}

pub async fn log_audit(pool: &DbPool, event: &AuditEvent) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(event.id)
    .bind(event.user_id)
    .bind(event.action.as_str())
    .bind(event.action.resource())
    .bind(&event.metadata)
    .bind(event.at)
    .execute(pool)
    .await?;

    Ok(())
}
