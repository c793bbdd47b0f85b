use crate::{
    catalog::{self, CartTotals, LineAmount, StockLevel},
    config::AppConfig,
    entities::{cart_item, CartItem, CartItemModel, Product, ProductVariant},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, LoaderTrait,
    ModelTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// The key scoping a cart: an authenticated user id or an anonymous session
/// id, never both. Threaded explicitly through every cart operation rather
/// than held as ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerKey {
    User(Uuid),
    Session(String),
}

impl OwnerKey {
    fn condition(&self) -> Condition {
        match self {
            OwnerKey::User(id) => Condition::all().add(cart_item::Column::UserId.eq(*id)),
            OwnerKey::Session(sid) => {
                Condition::all().add(cart_item::Column::SessionId.eq(sid.clone()))
            }
        }
    }
}

/// Input for adding an item to the cart
#[derive(Debug, Deserialize)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

/// One priced cart line as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub product_name: String,
    pub product_slug: String,
    pub image_url: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub stock_level: StockLevel,
}

/// Cart contents with undiscounted totals at full precision.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub totals: CartTotals,
}

impl CartView {
    pub fn line_amounts(&self) -> Vec<LineAmount> {
        self.items
            .iter()
            .map(|i| LineAmount {
                unit_price: i.unit_price,
                quantity: i.quantity,
            })
            .collect()
    }
}

/// Shopping cart service: owner-keyed line mutations and priced reads.
///
/// All mutations are single-writer per owner; the at-most-one-line-per-
/// variant invariant is maintained inside a transaction.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CartService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Adds a variant to the owner's cart, or bumps the quantity when the
    /// variant is already present (the cart never holds two rows for the
    /// same variant).
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner: &OwnerKey,
        input: AddToCartInput,
    ) -> Result<CartItemModel, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let variant = ProductVariant::find_by_id(input.variant_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Variant {} not found", input.variant_id))
            })?;

        if variant.product_id != input.product_id {
            return Err(ServiceError::ValidationError(
                "Variant does not belong to the given product".to_string(),
            ));
        }

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        if !product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "{} is no longer available",
                product.name
            )));
        }

        let existing = CartItem::find()
            .filter(owner.condition())
            .filter(cart_item::Column::VariantId.eq(input.variant_id))
            .one(&txn)
            .await?;

        let requested_total = existing.as_ref().map_or(0, |i| i.quantity) + input.quantity;
        if variant.stock_quantity < requested_total {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} of {} left in stock",
                variant.stock_quantity, product.name
            )));
        }

        let saved = if let Some(item) = existing {
            let mut active: cart_item::ActiveModel = item.into();
            active.quantity = Set(requested_total);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?
        } else {
            let (user_id, session_id) = match owner {
                OwnerKey::User(id) => (Some(*id), None),
                OwnerKey::Session(sid) => (None, Some(sid.clone())),
            };
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                session_id: Set(session_id),
                product_id: Set(input.product_id),
                variant_id: Set(input.variant_id),
                quantity: Set(input.quantity),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?
        };

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                variant_id: input.variant_id,
                quantity: input.quantity,
            })
            .await;

        info!(
            "Added variant {} x{} to cart",
            input.variant_id, input.quantity
        );
        Ok(saved)
    }

    /// Sets the quantity of a cart line. Non-positive quantities are
    /// rejected: zero is removal, not a stored state.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        owner: &OwnerKey,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartItemModel, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1; remove the line instead".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let item = self.owned_item(&txn, owner, item_id).await?;

        let variant = ProductVariant::find_by_id(item.variant_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::Conflict("This item is no longer available".to_string())
            })?;

        if variant.stock_quantity < quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "Only {} left in stock",
                variant.stock_quantity
            )));
        }

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Removes one line from the owner's cart.
    #[instrument(skip(self))]
    pub async fn remove_item(&self, owner: &OwnerKey, item_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let item = self.owned_item(&txn, owner, item_id).await?;
        let variant_id = item.variant_id;
        item.delete(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved { variant_id })
            .await;
        Ok(())
    }

    /// Deletes every line in the owner's cart.
    #[instrument(skip(self))]
    pub async fn clear(&self, owner: &OwnerKey) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(owner.condition())
            .exec(&*self.db)
            .await?;
        self.event_sender.send_or_log(Event::CartCleared).await;
        Ok(())
    }

    /// Folds an anonymous session cart into a user's cart after login.
    /// Lines for variants the user already holds add their quantities to
    /// the user row; the rest are re-keyed to the user.
    #[instrument(skip(self))]
    pub async fn merge_session_into_user(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let session_lines = CartItem::find()
            .filter(cart_item::Column::SessionId.eq(session_id))
            .all(&txn)
            .await?;

        for line in session_lines {
            let user_line = CartItem::find()
                .filter(cart_item::Column::UserId.eq(user_id))
                .filter(cart_item::Column::VariantId.eq(line.variant_id))
                .one(&txn)
                .await?;

            if let Some(existing) = user_line {
                let merged = existing.quantity + line.quantity;
                let mut active: cart_item::ActiveModel = existing.into();
                active.quantity = Set(merged);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?;
                line.delete(&txn).await?;
            } else {
                let mut active: cart_item::ActiveModel = line.into();
                active.user_id = Set(Some(user_id));
                active.session_id = Set(None);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?;
            }
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartMerged {
                session_id: session_id.to_string(),
                user_id,
            })
            .await;
        Ok(())
    }

    /// Loads and prices the owner's cart. Totals carry no discount; callers
    /// that validated a code recompute with
    /// [`catalog::compute_totals`] over [`CartView::line_amounts`].
    #[instrument(skip(self))]
    pub async fn get_cart(&self, owner: &OwnerKey) -> Result<CartView, ServiceError> {
        let lines = CartItem::find()
            .filter(owner.condition())
            .all(&*self.db)
            .await?;

        let variants = lines.load_one(ProductVariant, &*self.db).await?;
        let products = lines.load_one(Product, &*self.db).await?;

        let mut items = Vec::with_capacity(lines.len());
        for ((line, variant), product) in lines.into_iter().zip(variants).zip(products) {
            let (Some(variant), Some(product)) = (variant, product) else {
                // Product or variant deleted since the line was added;
                // stale lines are skipped rather than priced.
                warn!(line_id = %line.id, "skipping cart line with missing product/variant");
                continue;
            };
            let unit_price = product.effective_price();
            items.push(CartLineView {
                id: line.id,
                product_id: product.id,
                variant_id: variant.id,
                product_name: product.name.clone(),
                product_slug: product.slug.clone(),
                image_url: product
                    .image_url
                    .clone()
                    .unwrap_or_else(|| self.config.placeholder_image_url.clone()),
                size: variant.size.clone(),
                color: variant.color.clone(),
                unit_price,
                quantity: line.quantity,
                line_total: unit_price * Decimal::from(line.quantity),
                stock_level: StockLevel::classify(variant.stock_quantity),
            });
        }

        let amounts: Vec<LineAmount> = items
            .iter()
            .map(|i| LineAmount {
                unit_price: i.unit_price,
                quantity: i.quantity,
            })
            .collect();
        let totals = catalog::compute_totals(&amounts, None, self.config.shipping_policy());

        Ok(CartView { items, totals })
    }

    async fn owned_item(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        owner: &OwnerKey,
        item_id: Uuid,
    ) -> Result<CartItemModel, ServiceError> {
        CartItem::find_by_id(item_id)
            .filter(owner.condition())
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))
    }
}
