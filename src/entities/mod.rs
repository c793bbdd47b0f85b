/// Storefront entities
pub mod cart_item;
pub mod category;
pub mod discount_code;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_image;
pub mod product_variant;

// Re-export entities
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use discount_code::{Entity as DiscountCode, Model as DiscountCodeModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_image::{Entity as ProductImage, Model as ProductImageModel};
pub use product_variant::{Entity as ProductVariant, Model as ProductVariantModel};
