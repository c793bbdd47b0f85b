pub mod cart;
pub mod categories;
pub mod checkout;
pub mod common;
pub mod discounts;
pub mod orders;
pub mod products;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

/// Back-office surface. Every route in here takes the [`crate::auth::AdminUser`]
/// extractor, so non-admin callers are rejected before any handler runs.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/products", products::admin_routes())
        .nest("/categories", categories::admin_routes())
        .nest("/orders", orders::admin_routes())
        .nest("/discounts", discounts::admin_routes())
}
