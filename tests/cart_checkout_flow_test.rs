//! Integration tests over an in-memory SQLite database covering the cart
//! upsert invariant, checkout with conditional stock decrement, discount
//! consumption, and order status enforcement.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use migrations::{Migrator, MigratorTrait};
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use storefront_api::config::AppConfig;
use storefront_api::entities::{
    cart_item, category, product, product_variant, CartItem, Order, OrderItem, OrderStatus,
    ProductVariant,
};
use storefront_api::errors::ServiceError;
use storefront_api::events::EventSender;
use storefront_api::money;
use storefront_api::services::{
    cart::{AddToCartInput, OwnerKey},
    checkout::PlaceOrderInput,
    discounts::CreateDiscountInput,
    AppServices,
};

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "test".into(),
        log_level: "warn".into(),
        log_json: false,
        jwt_secret: "integration-test-secret-integration-test".into(),
        free_shipping_threshold: dec!(100),
        flat_shipping_fee: dec!(10),
        catalog_page_size: 12,
        placeholder_image_url: "/media/placeholder.png".into(),
        media_root: std::env::temp_dir()
            .join("storefront-media-test")
            .to_string_lossy()
            .into_owned(),
        media_base_url: "/media".into(),
        cors_allowed_origins: None,
        auto_migrate: false,
    }
}

struct TestApp {
    db: Arc<DatabaseConnection>,
    services: AppServices,
    // Keeps the event channel open for the lifetime of the test.
    _event_rx: mpsc::Receiver<storefront_api::events::Event>,
}

async fn test_app() -> TestApp {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    // A single connection keeps every query on the same in-memory database.
    options
        .max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);
    let db = Database::connect(options).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");

    let db = Arc::new(db);
    let (tx, rx) = mpsc::channel(64);
    let services = AppServices::new(
        db.clone(),
        Arc::new(EventSender::new(tx)),
        Arc::new(test_config()),
    );
    TestApp {
        db,
        services,
        _event_rx: rx,
    }
}

struct Seeded {
    product_id: Uuid,
    variant_id: Uuid,
}

async fn seed_product(db: &DatabaseConnection, price: rust_decimal::Decimal, stock: i32) -> Seeded {
    let now = Utc::now();
    let category_id = Uuid::new_v4();
    category::ActiveModel {
        id: Set(category_id),
        name: Set("Women".into()),
        slug: Set(format!("women-{}", Uuid::new_v4().simple())),
        parent_id: Set(None),
        image_url: Set(None),
        display_order: Set(0),
        is_active: Set(true),
        created_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed category");

    let product_id = Uuid::new_v4();
    product::ActiveModel {
        id: Set(product_id),
        name: Set("Elegant Silk Evening Dress".into()),
        slug: Set(format!("dress-{}", Uuid::new_v4().simple())),
        description: Set(None),
        category_id: Set(category_id),
        base_price: Set(price),
        discount_price: Set(None),
        image_url: Set(None),
        rating: Set(None),
        reviews_count: Set(None),
        is_featured: Set(false),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed product");

    let variant_id = Uuid::new_v4();
    product_variant::ActiveModel {
        id: Set(variant_id),
        product_id: Set(product_id),
        size: Set(Some("M".into())),
        color: Set(Some("Black".into())),
        stock_quantity: Set(stock),
        sku: Set(format!("SKU-{}", Uuid::new_v4().simple())),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("seed variant");

    Seeded {
        product_id,
        variant_id,
    }
}

fn contact() -> PlaceOrderInput {
    PlaceOrderInput {
        customer_name: "Jane Doe".into(),
        customer_phone: "555-0100".into(),
        customer_address: "1 Main St, Springfield".into(),
        payment_method: None,
        notes: None,
        discount_code: None,
    }
}

// ==================== Cart upsert invariant ====================

#[tokio::test]
async fn re_adding_a_variant_bumps_quantity_instead_of_duplicating() {
    let app = test_app().await;
    let seeded = seed_product(&app.db, dec!(100.00), 10).await;
    let owner = OwnerKey::Session("sess-upsert".into());

    for quantity in [2, 1] {
        app.services
            .cart
            .add_item(
                &owner,
                AddToCartInput {
                    product_id: seeded.product_id,
                    variant_id: seeded.variant_id,
                    quantity,
                },
            )
            .await
            .expect("add to cart");
    }

    let rows = CartItem::find()
        .filter(cart_item::Column::SessionId.eq("sess-upsert"))
        .all(&*app.db)
        .await
        .expect("query cart");
    assert_eq!(rows.len(), 1, "one line per (owner, variant)");
    assert_eq!(rows[0].quantity, 3);
}

#[tokio::test]
async fn zero_quantity_update_is_rejected_not_stored() {
    let app = test_app().await;
    let seeded = seed_product(&app.db, dec!(100.00), 10).await;
    let owner = OwnerKey::Session("sess-zero".into());

    let line = app
        .services
        .cart
        .add_item(
            &owner,
            AddToCartInput {
                product_id: seeded.product_id,
                variant_id: seeded.variant_id,
                quantity: 1,
            },
        )
        .await
        .expect("add");

    let err = app
        .services
        .cart
        .set_quantity(&owner, line.id, 0)
        .await
        .expect_err("zero quantity must be rejected");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // The stored line is untouched.
    let stored = CartItem::find_by_id(line.id)
        .one(&*app.db)
        .await
        .expect("query")
        .expect("line still present");
    assert_eq!(stored.quantity, 1);
}

// ==================== Checkout ====================

#[tokio::test]
async fn checkout_decrements_stock_snapshots_items_and_clears_cart() {
    let app = test_app().await;
    let seeded = seed_product(&app.db, dec!(100.00), 5).await;
    let owner = OwnerKey::Session("sess-checkout".into());

    app.services
        .cart
        .add_item(
            &owner,
            AddToCartInput {
                product_id: seeded.product_id,
                variant_id: seeded.variant_id,
                quantity: 3,
            },
        )
        .await
        .expect("add");

    let placed = app
        .services
        .checkout
        .place_order(&owner, None, contact())
        .await
        .expect("place order");

    assert!(placed.order.order_number.starts_with("ORD-"));
    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert_eq!(money::round_display(placed.order.subtotal), dec!(300.00));
    // Free shipping at or above 100.
    assert_eq!(money::round_display(placed.order.total_amount), dec!(300.00));

    assert_eq!(placed.items.len(), 1);
    let item = &placed.items[0];
    assert_eq!(item.product_name, "Elegant Silk Evening Dress");
    assert_eq!(item.size.as_deref(), Some("M"));
    assert_eq!(item.color.as_deref(), Some("Black"));
    assert_eq!(item.quantity, 3);

    let variant = ProductVariant::find_by_id(seeded.variant_id)
        .one(&*app.db)
        .await
        .expect("query")
        .expect("variant");
    assert_eq!(variant.stock_quantity, 2, "5 - 3 after conditional decrement");

    let remaining = CartItem::find()
        .filter(cart_item::Column::SessionId.eq("sess-checkout"))
        .count(&*app.db)
        .await
        .expect("count");
    assert_eq!(remaining, 0, "cart emptied after checkout");
}

#[tokio::test]
async fn checkout_fails_and_rolls_back_when_stock_ran_out() {
    let app = test_app().await;
    let seeded = seed_product(&app.db, dec!(100.00), 5).await;
    let owner = OwnerKey::Session("sess-race".into());

    app.services
        .cart
        .add_item(
            &owner,
            AddToCartInput {
                product_id: seeded.product_id,
                variant_id: seeded.variant_id,
                quantity: 2,
            },
        )
        .await
        .expect("add");

    // Another buyer takes the stock between add-to-cart and checkout.
    let variant = ProductVariant::find_by_id(seeded.variant_id)
        .one(&*app.db)
        .await
        .expect("query")
        .expect("variant");
    let mut active: product_variant::ActiveModel = variant.into();
    active.stock_quantity = Set(1);
    active.update(&*app.db).await.expect("shrink stock");

    let err = app
        .services
        .checkout
        .place_order(&owner, None, contact())
        .await
        .expect_err("conditional decrement must fail");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // Nothing was written: no order, cart intact, stock untouched.
    assert_eq!(Order::find().count(&*app.db).await.expect("count"), 0);
    assert_eq!(OrderItem::find().count(&*app.db).await.expect("count"), 0);
    let cart_rows = CartItem::find()
        .filter(cart_item::Column::SessionId.eq("sess-race"))
        .count(&*app.db)
        .await
        .expect("count");
    assert_eq!(cart_rows, 1);
    let variant = ProductVariant::find_by_id(seeded.variant_id)
        .one(&*app.db)
        .await
        .expect("query")
        .expect("variant");
    assert_eq!(variant.stock_quantity, 1);
}

#[tokio::test]
async fn discount_is_applied_and_consumed_exactly_once() {
    let app = test_app().await;
    let seeded = seed_product(&app.db, dec!(100.00), 10).await;
    let owner = OwnerKey::Session("sess-discount".into());

    let code = app
        .services
        .discounts
        .create(CreateDiscountInput {
            code: "GLORY20".into(),
            percentage: dec!(20),
            min_purchase: None,
            max_uses: Some(10),
            expiry_date: None,
            is_active: true,
        })
        .await
        .expect("create code");

    app.services
        .cart
        .add_item(
            &owner,
            AddToCartInput {
                product_id: seeded.product_id,
                variant_id: seeded.variant_id,
                quantity: 3,
            },
        )
        .await
        .expect("add");

    // Re-typing the code validates repeatedly without consuming uses.
    for _ in 0..3 {
        app.services
            .discounts
            .validate("glory20", dec!(300.00))
            .await
            .expect("case-insensitive validation");
    }
    let unredeemed = storefront_api::entities::DiscountCode::find_by_id(code.id)
        .one(&*app.db)
        .await
        .expect("query")
        .expect("code");
    assert_eq!(unredeemed.current_uses, 0);

    let mut input = contact();
    input.discount_code = Some("GLORY20".into());
    let placed = app
        .services
        .checkout
        .place_order(&owner, None, input)
        .await
        .expect("place order");

    assert_eq!(money::round_display(placed.order.subtotal), dec!(300.00));
    assert_eq!(
        money::round_display(placed.order.discount_amount),
        dec!(60.00)
    );
    assert_eq!(
        money::round_display(placed.order.total_amount),
        dec!(240.00)
    );

    let redeemed = storefront_api::entities::DiscountCode::find_by_id(code.id)
        .one(&*app.db)
        .await
        .expect("query")
        .expect("code");
    assert_eq!(redeemed.current_uses, 1, "consumed exactly once per order");
}

// ==================== Order lifecycle at the data boundary ====================

#[tokio::test]
async fn status_transitions_are_enforced_server_side() {
    let app = test_app().await;
    let seeded = seed_product(&app.db, dec!(100.00), 10).await;
    let owner = OwnerKey::Session("sess-lifecycle".into());

    app.services
        .cart
        .add_item(
            &owner,
            AddToCartInput {
                product_id: seeded.product_id,
                variant_id: seeded.variant_id,
                quantity: 1,
            },
        )
        .await
        .expect("add");
    let placed = app
        .services
        .checkout
        .place_order(&owner, None, contact())
        .await
        .expect("place order");
    let order_id = placed.order.id;

    // Forward skip is rejected while the order is still pending.
    let err = app
        .services
        .orders
        .update_status(order_id, OrderStatus::Shipped)
        .await
        .expect_err("pending -> shipped is a forward skip");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // The legal path goes through step by step.
    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let updated = app
            .services
            .orders
            .update_status(order_id, next)
            .await
            .expect("legal transition");
        assert_eq!(updated.status, next);
    }

    // Delivered is terminal.
    for next in [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ] {
        assert!(app
            .services
            .orders
            .update_status(order_id, next)
            .await
            .is_err());
    }

    // Tracking reflects the delivered state.
    let tracking = app
        .services
        .orders
        .tracking(&placed.order.order_number)
        .await
        .expect("tracking");
    assert!(tracking.steps.iter().all(|s| s.completed));
}
