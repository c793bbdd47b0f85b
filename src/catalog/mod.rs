//! Pure catalog core: product kind resolution, variant selection and cart
//! total arithmetic. No I/O and no locking; the services layer wraps these
//! in storage transactions.

pub mod kind;
pub mod selectors;
pub mod totals;

pub use kind::{ProductKind, FRAGRANCE_CATEGORY_SLUG};
pub use selectors::{
    clamp_quantity, is_color_available, is_size_available, resolve_selectors, resolve_variant,
    Axis, SelectorSet, StockLevel, LOW_STOCK_THRESHOLD,
};
pub use totals::{compute_totals, CartTotals, LineAmount, ShippingPolicy};
