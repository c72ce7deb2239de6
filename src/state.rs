use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    store::{Deadline, PgCouponStore},
};

#[derive(Clone)]
pub struct AppState {
    pub store: PgCouponStore,
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Deadline for the store calls of a request starting now.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.config.store_timeout)
    }
}
