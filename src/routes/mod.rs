use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod coupons;
pub mod doc;
pub mod health;
pub mod params;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/coupons", coupons::router())
        .nest("/admin", admin::router())
}
