use crate::{
    catalog::{self, LineAmount},
    config::AppConfig,
    entities::{
        cart_item, order, order_item, product_variant, CartItem, OrderItemModel, OrderModel,
        OrderStatus, Product, ProductVariant,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money,
    services::{cart::OwnerKey, discounts::DiscountService},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, LoaderTrait,
    QueryFilter, Set, TransactionTrait,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

pub const PAYMENT_CASH_ON_DELIVERY: &str = "cash_on_delivery";

/// Checkout input: the contact/address snapshot plus an optional discount
/// code. Only cash on delivery is accepted today.
#[derive(Debug, Deserialize, Validate)]
pub struct PlaceOrderInput {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub customer_name: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub customer_phone: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub customer_address: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub discount_code: Option<String>,
}

/// A placed order with its snapshot lines.
#[derive(Debug, Serialize)]
pub struct PlacedOrder {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Converts a cart into an order.
///
/// The whole placement runs in one transaction: stock is taken with a
/// conditional decrement per line (never read-then-write), the discount
/// use is consumed exactly once, order and item snapshots are written and
/// the cart is emptied. Any failed step rolls the whole thing back, so a
/// lost stock race leaves no partial order behind.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    discounts: Arc<DiscountService>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        discounts: Arc<DiscountService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            discounts,
            config,
        }
    }

    #[instrument(skip(self, input), fields(payment_method = ?input.payment_method))]
    pub async fn place_order(
        &self,
        owner: &OwnerKey,
        user_id: Option<Uuid>,
        input: PlaceOrderInput,
    ) -> Result<PlacedOrder, ServiceError> {
        input.validate()?;
        let input = normalized(input)?;

        let payment_method = input
            .payment_method
            .clone()
            .unwrap_or_else(|| PAYMENT_CASH_ON_DELIVERY.to_string());
        if payment_method != PAYMENT_CASH_ON_DELIVERY {
            return Err(ServiceError::ValidationError(format!(
                "Unsupported payment method: {}",
                payment_method
            )));
        }

        let txn = self.db.begin().await?;

        let owner_condition = match owner {
            OwnerKey::User(id) => Condition::all().add(cart_item::Column::UserId.eq(*id)),
            OwnerKey::Session(sid) => {
                Condition::all().add(cart_item::Column::SessionId.eq(sid.clone()))
            }
        };

        let lines = CartItem::find()
            .filter(owner_condition.clone())
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation("Cart is empty".to_string()));
        }

        let variants = lines.load_one(ProductVariant, &txn).await?;
        let products = lines.load_one(Product, &txn).await?;

        // Resolve every line to live product/variant state before touching
        // stock. A variant or product removed since the cart was filled is
        // a conflict, detectable only here at the storage boundary.
        let mut resolved = Vec::with_capacity(lines.len());
        for ((line, variant), product) in lines.iter().zip(variants).zip(products) {
            let variant = variant.ok_or_else(|| {
                ServiceError::Conflict("An item in your cart is no longer available".to_string())
            })?;
            let product = product.ok_or_else(|| {
                ServiceError::Conflict("An item in your cart is no longer available".to_string())
            })?;
            if !product.is_active {
                return Err(ServiceError::Conflict(format!(
                    "{} is no longer available",
                    product.name
                )));
            }
            resolved.push((line, variant, product));
        }

        let amounts: Vec<LineAmount> = resolved
            .iter()
            .map(|(line, _, product)| LineAmount {
                unit_price: product.effective_price(),
                quantity: line.quantity,
            })
            .collect();
        let subtotal: Decimal = amounts.iter().map(LineAmount::line_total).sum();

        // At most one code per order; validation is re-run inside the
        // transaction so the amount reflects the subtotal being charged.
        let discount = match &input.discount_code {
            Some(code) => Some(self.discounts.validate_on(&txn, code, subtotal).await?),
            None => None,
        };

        let totals = catalog::compute_totals(
            &amounts,
            discount.as_ref().map(|d| d.percentage),
            self.config.shipping_policy(),
        )
        .display();

        // Conditional decrement: only succeeds while enough stock remains,
        // atomically, so two buyers cannot both take the last unit.
        for (line, variant, product) in &resolved {
            let result = ProductVariant::update_many()
                .col_expr(
                    product_variant::Column::StockQuantity,
                    Expr::col(product_variant::Column::StockQuantity).sub(line.quantity),
                )
                .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(product_variant::Column::Id.eq(variant.id))
                .filter(product_variant::Column::StockQuantity.gte(line.quantity))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "{} is out of stock",
                    product.name
                )));
            }
        }

        if let Some(d) = &discount {
            self.discounts.consume(&txn, d.id).await?;
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number(order_id)),
            user_id: Set(user_id),
            customer_name: Set(input.customer_name.clone()),
            customer_phone: Set(input.customer_phone.clone()),
            customer_address: Set(input.customer_address.clone()),
            subtotal: Set(totals.subtotal),
            discount_amount: Set(totals.discount_amount),
            total_amount: Set(totals.total),
            status: Set(OrderStatus::Pending),
            payment_method: Set(payment_method),
            notes: Set(input.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(resolved.len());
        for (line, variant, product) in &resolved {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                variant_id: Set(Some(variant.id)),
                product_name: Set(product.name.clone()),
                size: Set(variant.size.clone()),
                color: Set(variant.color.clone()),
                price_at_purchase: Set(money::round_display(product.effective_price())),
                quantity: Set(line.quantity),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        CartItem::delete_many()
            .filter(owner_condition)
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        if let Some(d) = &discount {
            self.event_sender
                .send_or_log(Event::DiscountCodeRedeemed {
                    code: d.code.clone(),
                    order_id,
                })
                .await;
        }

        info!(
            "Placed order {} ({} lines, total {})",
            order.order_number,
            items.len(),
            order.total_amount
        );
        Ok(PlacedOrder { order, items })
    }
}

/// Human-readable unique order number derived from the order id.
fn generate_order_number(order_id: Uuid) -> String {
    format!("ORD-{}", order_id.to_string()[..8].to_uppercase())
}

fn normalized(mut input: PlaceOrderInput) -> Result<PlaceOrderInput, ServiceError> {
    input.customer_name = input.customer_name.trim().to_string();
    input.customer_phone = input.customer_phone.trim().to_string();
    input.customer_address = input.customer_address.trim().to_string();
    if input.customer_name.is_empty()
        || input.customer_phone.is_empty()
        || input.customer_address.is_empty()
    {
        return Err(ServiceError::ValidationError(
            "Name, phone and address are required".to_string(),
        ));
    }
    Ok(input)
}
