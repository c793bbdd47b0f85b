//! End-to-end tests for the catalog core: selector derivation, variant
//! resolution, and cart total computation, driven through the crate's
//! public API.

use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::catalog::{
    self, clamp_quantity, compute_totals, is_size_available, resolve_selectors, resolve_variant,
    CartTotals, LineAmount, ProductKind, ShippingPolicy, StockLevel,
};
use storefront_api::entities::product_variant;
use storefront_api::services::discounts::{evaluate, DiscountRejection};
use storefront_api::entities::DiscountCodeModel;

const SHIPPING: ShippingPolicy = ShippingPolicy {
    free_threshold: dec!(100),
    flat_fee: dec!(10),
};

fn variant(size: Option<&str>, color: Option<&str>, stock: i32) -> product_variant::Model {
    product_variant::Model {
        id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        size: size.map(str::to_owned),
        color: color.map(str::to_owned),
        stock_quantity: stock,
        sku: format!("SKU-{}", Uuid::new_v4().simple()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// ==================== Variant resolution scenarios ====================

#[test]
fn perfume_with_sold_out_volume_lists_it_as_unavailable() {
    // Variant set [{50ml, stock 0}, {100ml, stock 3}] on a perfumes-category
    // product: both volumes listed, 50ml disabled, 100ml selectable.
    let variants = vec![
        variant(Some("50ml"), None, 0),
        variant(Some("100ml"), None, 3),
    ];
    let kind = ProductKind::resolve(Some("perfumes"), &variants);
    assert_eq!(kind, ProductKind::Fragrance);

    let set = resolve_selectors(kind, &variants);
    assert_eq!(set.options, vec!["50ml", "100ml"]);
    assert!(!is_size_available(&variants, "50ml"));
    assert!(is_size_available(&variants, "100ml"));

    let resolved = resolve_variant(kind, &variants, Some("100ml"), None).expect("resolvable");
    assert_eq!(StockLevel::classify(resolved.stock_quantity), StockLevel::LowStock);
}

#[test]
fn perfume_color_data_never_surfaces() {
    let variants = vec![
        variant(Some("30ml"), Some("Amber"), 2),
        variant(Some("50ml"), Some("Gold"), 2),
    ];
    let set = resolve_selectors(ProductKind::resolve(Some("perfumes"), &variants), &variants);
    assert!(set.colors.is_empty());
    assert_eq!(set.axes(), vec![catalog::Axis::Volume]);
}

#[test]
fn volume_derivation_accepts_only_ml_shaped_sizes() {
    // Strings matching /^\d+\s*ml$/i survive and re-render as "{n}ml";
    // everything else is dropped.
    let variants = vec![
        variant(Some("50ml"), None, 1),
        variant(Some("100 ML"), None, 1),
        variant(Some("onesize"), None, 1),
        variant(Some("ml"), None, 1),
    ];
    let set = resolve_selectors(ProductKind::Fragrance, &variants);
    assert_eq!(set.options, vec!["50ml", "100ml"]);
}

#[test]
fn clothing_product_requires_both_axes() {
    let variants = vec![
        variant(Some("M"), Some("Black"), 2),
        variant(Some("L"), Some("Navy"), 0),
    ];
    let kind = ProductKind::resolve(Some("women"), &variants);
    assert_eq!(kind, ProductKind::Apparel);

    assert!(resolve_variant(kind, &variants, Some("M"), None).is_none());
    assert!(resolve_variant(kind, &variants, None, Some("Black")).is_none());
    assert!(resolve_variant(kind, &variants, Some("M"), Some("Black")).is_some());
}

#[test]
fn colorless_product_matches_on_size_alone() {
    let variants = vec![variant(Some("One Size"), None, 9)];
    let kind = ProductKind::resolve(Some("bags"), &variants);
    assert_eq!(kind, ProductKind::Generic);
    assert!(resolve_variant(kind, &variants, Some("One Size"), None).is_some());
}

#[test]
fn quantity_stepper_clamps_to_resolved_stock() {
    assert_eq!(clamp_quantity(99, Some(3)), 3);
    assert_eq!(clamp_quantity(2, None), 2);
    assert_eq!(clamp_quantity(0, None), 1);
}

// ==================== Cart total scenarios ====================

#[test]
fn two_line_cart_with_twenty_percent_code() {
    // One line 249.99 x1, one line 149.99 x2 -> subtotal 549.97;
    // 20% code -> 109.994 (109.99 rounded); shipping 0; total 439.98.
    let lines = [
        LineAmount {
            unit_price: dec!(249.99),
            quantity: 1,
        },
        LineAmount {
            unit_price: dec!(149.99),
            quantity: 2,
        },
    ];
    let totals = compute_totals(&lines, Some(dec!(20)), SHIPPING);
    assert_eq!(totals.subtotal, dec!(549.97));
    assert_eq!(totals.discount_amount, dec!(109.994));
    assert_eq!(totals.shipping, dec!(0));
    assert_eq!(totals.total, dec!(439.976));

    let display = totals.display();
    assert_eq!(display.discount_amount, dec!(109.99));
    assert_eq!(display.total, dec!(439.98));
}

#[test]
fn free_shipping_boundary_is_exact() {
    let at_boundary = compute_totals(
        &[LineAmount {
            unit_price: dec!(100.00),
            quantity: 1,
        }],
        None,
        SHIPPING,
    );
    assert_eq!(at_boundary.shipping, dec!(0));

    let just_below = compute_totals(
        &[LineAmount {
            unit_price: dec!(99.99),
            quantity: 1,
        }],
        None,
        SHIPPING,
    );
    assert_eq!(just_below.shipping, dec!(10));
}

#[test]
fn totals_invariant_over_varied_inputs() {
    let price_pool = [dec!(0.01), dec!(9.99), dec!(149.99), dec!(2500.00)];
    let pct_pool = [None, Some(dec!(5)), Some(dec!(50)), Some(dec!(100))];
    for (i, &price) in price_pool.iter().enumerate() {
        for &pct in &pct_pool {
            let lines = [
                LineAmount {
                    unit_price: price,
                    quantity: (i as i32) + 1,
                },
                LineAmount {
                    unit_price: dec!(3.33),
                    quantity: 2,
                },
            ];
            let CartTotals {
                subtotal,
                discount_amount,
                shipping,
                total,
            } = compute_totals(&lines, pct, SHIPPING);
            assert!(discount_amount <= subtotal);
            assert!(total >= dec!(0));
            assert_eq!(total, (subtotal - discount_amount).max(dec!(0)) + shipping);
        }
    }
}

// ==================== Discount validation scenarios ====================

fn discount(percentage: rust_decimal::Decimal) -> DiscountCodeModel {
    DiscountCodeModel {
        id: Uuid::new_v4(),
        code: "GLORY20".to_string(),
        percentage,
        min_purchase: None,
        max_uses: None,
        current_uses: 0,
        expiry_date: None,
        is_active: true,
        created_at: Utc::now(),
    }
}

#[test]
fn discount_validation_checks_run_in_order() {
    let mut code = discount(dec!(20));
    code.is_active = false;
    code.expiry_date = Some(Utc::now() - chrono::Duration::days(2));
    // Inactive wins over expired: existence/activity is checked first.
    assert_eq!(
        evaluate(Some(&code), Utc::now(), dec!(1000)),
        Err(DiscountRejection::UnknownCode)
    );
}

#[test]
fn validation_does_not_consume_uses() {
    let code = discount(dec!(20));
    for _ in 0..5 {
        evaluate(Some(&code), Utc::now(), dec!(200)).expect("valid");
    }
    assert_eq!(code.current_uses, 0);
}

#[test]
fn discount_amount_feeds_cart_totals() {
    let code = discount(dec!(20));
    let subtotal = dec!(549.97);
    let amount = evaluate(Some(&code), Utc::now(), subtotal).expect("valid");
    assert_eq!(amount, dec!(109.994));

    let totals = compute_totals(
        &[LineAmount {
            unit_price: subtotal,
            quantity: 1,
        }],
        Some(code.percentage),
        SHIPPING,
    );
    assert_eq!(totals.discount_amount, amount);
}
