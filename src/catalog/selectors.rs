//! Variant resolution: maps a product's variant set onto selector axes,
//! derives the option lists, answers availability queries and classifies
//! stock. Everything here is pure and synchronous.

use serde::{Deserialize, Serialize};

use super::kind::ProductKind;
use crate::entities::product_variant;

/// Stock below this count is surfaced as "only N left".
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// A selectable product dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Size,
    Color,
    Volume,
}

/// Selector axes and option lists for one product.
#[derive(Debug, Clone, Serialize)]
pub struct SelectorSet {
    pub kind: ProductKind,
    /// Size options, or canonical volume options for fragrances.
    pub options: Vec<String>,
    /// Color options; empty when the product has no color axis.
    pub colors: Vec<String>,
}

impl SelectorSet {
    pub fn axes(&self) -> Vec<Axis> {
        match self.kind {
            ProductKind::Fragrance => vec![Axis::Volume],
            ProductKind::Apparel => vec![Axis::Size, Axis::Color],
            ProductKind::Generic => vec![Axis::Size],
        }
    }

    pub fn has_color_axis(&self) -> bool {
        self.kind == ProductKind::Apparel
    }
}

/// Derives the selector set for a product.
pub fn resolve_selectors(kind: ProductKind, variants: &[product_variant::Model]) -> SelectorSet {
    let options = match kind {
        ProductKind::Fragrance => volume_options(variants),
        _ => size_options(variants),
    };
    let colors = if kind == ProductKind::Apparel {
        color_options(variants)
    } else {
        Vec::new()
    };
    SelectorSet {
        kind,
        options,
        colors,
    }
}

/// Distinct non-empty size values in variant insertion order.
pub fn size_options(variants: &[product_variant::Model]) -> Vec<String> {
    let mut seen = Vec::new();
    for size in variants.iter().filter_map(|v| v.size.as_deref()) {
        if !size.is_empty() && !seen.iter().any(|s| s == size) {
            seen.push(size.to_owned());
        }
    }
    seen
}

/// Distinct non-empty color values in variant insertion order.
pub fn color_options(variants: &[product_variant::Model]) -> Vec<String> {
    let mut seen = Vec::new();
    for color in variants.iter().filter_map(|v| v.color.as_deref()) {
        if !color.is_empty() && !seen.iter().any(|c| c == color) {
            seen.push(color.to_owned());
        }
    }
    seen
}

/// Canonical volume options for a fragrance: each distinct size string is
/// stripped of a trailing "ml" (any case, surrounding whitespace trimmed)
/// and parsed as an integer; unparseable values are dropped silently. The
/// survivors are deduplicated, sorted ascending and re-rendered as `"{n}ml"`.
pub fn volume_options(variants: &[product_variant::Model]) -> Vec<String> {
    let mut volumes: Vec<u32> = size_options(variants)
        .iter()
        .filter_map(|s| parse_volume(s))
        .collect();
    volumes.sort_unstable();
    volumes.dedup();
    volumes.into_iter().map(|n| format!("{}ml", n)).collect()
}

fn parse_volume(size: &str) -> Option<u32> {
    let trimmed = size.trim();
    let lower = trimmed.to_ascii_lowercase();
    let digits = lower.strip_suffix("ml").unwrap_or(&lower);
    digits.trim().parse().ok()
}

/// Resolves the concrete variant for a selection. No size selected resolves
/// to `None` without side effects; callers surface
/// [`ProductKind::selection_prompt`] instead of proceeding. Single-axis
/// kinds match on size alone; apparel requires both size and color to equal
/// the stored values exactly (case-sensitive).
pub fn resolve_variant<'a>(
    kind: ProductKind,
    variants: &'a [product_variant::Model],
    size: Option<&str>,
    color: Option<&str>,
) -> Option<&'a product_variant::Model> {
    let size = size?;
    variants.iter().find(|v| {
        if kind.single_axis() {
            v.size.as_deref() == Some(size)
        } else {
            v.size.as_deref() == Some(size) && v.color.as_deref() == color
        }
    })
}

/// True when at least one variant with that exact size value, regardless of
/// color, has stock.
pub fn is_size_available(variants: &[product_variant::Model], option: &str) -> bool {
    variants
        .iter()
        .filter(|v| v.size.as_deref() == Some(option))
        .any(|v| v.stock_quantity > 0)
}

/// Color availability scoped to variants of the given size.
pub fn is_color_available(variants: &[product_variant::Model], size: &str, color: &str) -> bool {
    variants
        .iter()
        .filter(|v| v.size.as_deref() == Some(size) && v.color.as_deref() == Some(color))
        .any(|v| v.stock_quantity > 0)
}

/// Stock classification for a resolved variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLevel {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockLevel {
    pub fn classify(stock_quantity: i32) -> Self {
        if stock_quantity <= 0 {
            StockLevel::OutOfStock
        } else if stock_quantity < LOW_STOCK_THRESHOLD {
            StockLevel::LowStock
        } else {
            StockLevel::InStock
        }
    }
}

/// Clamps a requested quantity to `[1, stock]` once a variant is resolved,
/// and to `[1, inf)` while none is. Checkout refuses unresolved selections
/// regardless.
pub fn clamp_quantity(requested: i32, stock: Option<i32>) -> i32 {
    let at_least_one = requested.max(1);
    match stock {
        Some(s) => at_least_one.min(s.max(1)),
        None => at_least_one,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn variant(size: Option<&str>, color: Option<&str>, stock: i32) -> product_variant::Model {
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            size: size.map(str::to_owned),
            color: color.map(str::to_owned),
            stock_quantity: stock,
            sku: format!("SKU-{}", Uuid::new_v4()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn fragrance_never_exposes_a_color_axis() {
        let variants = vec![
            variant(Some("50ml"), Some("Gold"), 3),
            variant(Some("100ml"), Some("Amber"), 2),
        ];
        let set = resolve_selectors(ProductKind::Fragrance, &variants);
        assert!(set.colors.is_empty());
        assert!(!set.has_color_axis());
        assert_eq!(set.axes(), vec![Axis::Volume]);
    }

    #[test]
    fn volume_options_parse_sort_and_rerender() {
        let variants = vec![
            variant(Some("100ml"), None, 1),
            variant(Some(" 50 ML "), None, 1),
            variant(Some("30ml"), None, 1),
            variant(Some("travel"), None, 1),
            variant(Some("100ml"), None, 4),
        ];
        assert_eq!(
            volume_options(&variants),
            vec!["30ml", "50ml", "100ml"],
            "numeric ascending, deduplicated, unparseable dropped"
        );
    }

    #[test]
    fn bare_numeric_sizes_also_parse_as_volumes() {
        let variants = vec![variant(Some("75"), None, 1)];
        assert_eq!(volume_options(&variants), vec!["75ml"]);
    }

    #[test]
    fn size_options_keep_insertion_order() {
        let variants = vec![
            variant(Some("M"), Some("Black"), 1),
            variant(Some("S"), Some("Black"), 1),
            variant(Some("M"), Some("Navy"), 1),
            variant(None, Some("Navy"), 1),
            variant(Some(""), None, 1),
        ];
        assert_eq!(size_options(&variants), vec!["M", "S"]);
    }

    #[test]
    fn resolve_requires_size_first() {
        let variants = vec![variant(Some("M"), Some("Black"), 1)];
        assert!(resolve_variant(ProductKind::Apparel, &variants, None, Some("Black")).is_none());
    }

    #[test]
    fn apparel_resolution_needs_exact_size_and_color() {
        let variants = vec![
            variant(Some("M"), Some("Black"), 1),
            variant(Some("M"), Some("Navy"), 2),
        ];
        let hit = resolve_variant(ProductKind::Apparel, &variants, Some("M"), Some("Navy"))
            .expect("variant");
        assert_eq!(hit.color.as_deref(), Some("Navy"));
        // Case-sensitive match.
        assert!(resolve_variant(ProductKind::Apparel, &variants, Some("M"), Some("navy")).is_none());
        assert!(resolve_variant(ProductKind::Apparel, &variants, Some("M"), None).is_none());
    }

    #[test]
    fn single_axis_resolution_ignores_color() {
        let variants = vec![variant(Some("50ml"), Some("Gold"), 1)];
        let hit = resolve_variant(ProductKind::Fragrance, &variants, Some("50ml"), None);
        assert!(hit.is_some());
    }

    #[test]
    fn out_of_stock_volume_listed_but_unavailable() {
        // Perfume with a sold-out 50ml and a stocked 100ml.
        let variants = vec![
            variant(Some("50ml"), None, 0),
            variant(Some("100ml"), None, 3),
        ];
        let set = resolve_selectors(ProductKind::Fragrance, &variants);
        assert_eq!(set.options, vec!["50ml", "100ml"]);
        assert!(!is_size_available(&variants, "50ml"));
        assert!(is_size_available(&variants, "100ml"));
    }

    #[test]
    fn color_availability_is_scoped_to_size() {
        let variants = vec![
            variant(Some("M"), Some("Black"), 0),
            variant(Some("L"), Some("Black"), 5),
        ];
        assert!(!is_color_available(&variants, "M", "Black"));
        assert!(is_color_available(&variants, "L", "Black"));
    }

    #[test]
    fn stock_classification_boundaries() {
        assert_eq!(StockLevel::classify(0), StockLevel::OutOfStock);
        assert_eq!(StockLevel::classify(1), StockLevel::LowStock);
        assert_eq!(StockLevel::classify(4), StockLevel::LowStock);
        assert_eq!(StockLevel::classify(5), StockLevel::InStock);
    }

    #[test]
    fn quantity_clamps_to_stock_when_resolved() {
        assert_eq!(clamp_quantity(10, Some(3)), 3);
        assert_eq!(clamp_quantity(0, Some(3)), 1);
        assert_eq!(clamp_quantity(-2, None), 1);
        assert_eq!(clamp_quantity(7, None), 7);
    }
}
