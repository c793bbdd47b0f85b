//! Business operations over the database.
//!
//! Reads are idempotent and safe for callers to retry; mutations are not
//! and must surface their typed error instead of being retried blindly
//! (a retried checkout or discount redemption would double-charge).

pub mod cart;
pub mod categories;
pub mod checkout;
pub mod discounts;
pub mod media;
pub mod orders;
pub mod products;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{config::AppConfig, events::EventSender};

/// Aggregated application services shared by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<products::ProductCatalogService>,
    pub categories: Arc<categories::CategoryService>,
    pub cart: Arc<cart::CartService>,
    pub discounts: Arc<discounts::DiscountService>,
    pub checkout: Arc<checkout::CheckoutService>,
    pub orders: Arc<orders::OrderService>,
    pub media: Arc<dyn media::ObjectStore>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        let discounts = Arc::new(discounts::DiscountService::new(db.clone()));
        Self {
            products: Arc::new(products::ProductCatalogService::new(
                db.clone(),
                event_sender.clone(),
                config.clone(),
            )),
            categories: Arc::new(categories::CategoryService::new(
                db.clone(),
                event_sender.clone(),
            )),
            cart: Arc::new(cart::CartService::new(
                db.clone(),
                event_sender.clone(),
                config.clone(),
            )),
            checkout: Arc::new(checkout::CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                discounts.clone(),
                config.clone(),
            )),
            orders: Arc::new(orders::OrderService::new(db, event_sender)),
            media: Arc::new(media::FsObjectStore::new(
                config.media_root.clone(),
                config.media_base_url.clone(),
            )),
            discounts,
        }
    }
}
