use serde::{Deserialize, Serialize};

use crate::entities::product_variant;

/// Category slug that switches a product to volume-only selection.
pub const FRAGRANCE_CATEGORY_SLUG: &str = "perfumes";

/// How a product's variant set maps onto selector axes.
///
/// Resolved once at load time instead of scattering category-slug string
/// comparisons through the selection logic:
/// - `Fragrance`: volume axis only; variant color data is ignored outright.
/// - `Apparel`: size + color axes.
/// - `Generic`: size axis only (no variant carries a color value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Apparel,
    Fragrance,
    Generic,
}

impl ProductKind {
    pub fn resolve(category_slug: Option<&str>, variants: &[product_variant::Model]) -> Self {
        if category_slug == Some(FRAGRANCE_CATEGORY_SLUG) {
            return ProductKind::Fragrance;
        }
        let has_color = variants
            .iter()
            .any(|v| v.color.as_deref().is_some_and(|c| !c.is_empty()));
        if has_color {
            ProductKind::Apparel
        } else {
            ProductKind::Generic
        }
    }

    /// True when selection is matched on size alone.
    pub fn single_axis(self) -> bool {
        !matches!(self, ProductKind::Apparel)
    }

    /// User-facing prompt shown when add-to-cart is attempted without a
    /// resolved variant.
    pub fn selection_prompt(self) -> &'static str {
        if self.single_axis() {
            "Please select a size/volume"
        } else {
            "Please select size and color"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn variant(size: Option<&str>, color: Option<&str>) -> product_variant::Model {
        product_variant::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            size: size.map(str::to_owned),
            color: color.map(str::to_owned),
            stock_quantity: 1,
            sku: "SKU".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn perfumes_category_wins_even_with_color_data() {
        let variants = vec![variant(Some("50ml"), Some("Amber"))];
        assert_eq!(
            ProductKind::resolve(Some("perfumes"), &variants),
            ProductKind::Fragrance
        );
    }

    #[test]
    fn color_data_makes_apparel() {
        let variants = vec![variant(Some("M"), Some("Black"))];
        assert_eq!(
            ProductKind::resolve(Some("women"), &variants),
            ProductKind::Apparel
        );
    }

    #[test]
    fn no_color_values_means_generic() {
        let variants = vec![variant(Some("M"), None), variant(Some("L"), Some(""))];
        assert_eq!(
            ProductKind::resolve(Some("bags"), &variants),
            ProductKind::Generic
        );
    }
}
