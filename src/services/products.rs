use crate::{
    catalog::{self, ProductKind, SelectorSet},
    config::AppConfig,
    entities::{
        cart_item, category, order_item, product, product_image, product_variant, CartItem,
        Category, OrderItem, Product, ProductImage, ProductImageModel, ProductModel,
        ProductVariant, ProductVariantModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, LoaderTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Func, Query as SeaQuery},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

const MAX_PAGE_SIZE: u64 = 100;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex"));

/// Filter selections for the product listing. Category, price, color and
/// stock narrowing run server-side; size narrowing is a client-side second
/// phase because size values are free text.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub category_slugs: Vec<String>,
    pub search: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub in_stock: bool,
    pub featured: Option<bool>,
    pub page: u64,
    pub per_page: u64,
}

/// A catalog product with its nested images and variants.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogProduct {
    #[serde(flatten)]
    pub product: ProductModel,
    pub images: Vec<ProductImageModel>,
    pub variants: Vec<ProductVariantModel>,
    pub primary_image_url: String,
}

/// One listing page. `has_next_page` comes from the look-ahead fetch, not
/// from a separate count query.
#[derive(Debug, Serialize)]
pub struct CatalogPage {
    pub products: Vec<CatalogProduct>,
    pub page: u64,
    pub per_page: u64,
    pub has_next_page: bool,
}

/// An option value with its availability flag.
#[derive(Debug, Clone, Serialize)]
pub struct OptionAvailability {
    pub value: String,
    pub available: bool,
}

/// Selector axes with per-option availability for the product page.
#[derive(Debug, Serialize)]
pub struct SelectorView {
    pub kind: ProductKind,
    pub axes: Vec<catalog::Axis>,
    pub options: Vec<OptionAvailability>,
    /// Color options; availability is scoped to the selected size and reads
    /// unavailable until a size is chosen.
    pub colors: Vec<OptionAvailability>,
}

/// Full product detail for the product page.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductModel,
    pub category_slug: Option<String>,
    pub images: Vec<ProductImageModel>,
    pub variants: Vec<ProductVariantModel>,
    pub selectors: SelectorView,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub base_price: Decimal,
    pub discount_price: Option<Decimal>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Input for updating a product; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub base_price: Option<Decimal>,
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    pub clear_discount_price: bool,
    pub image_url: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

/// Input for one variant when replacing a product's variant set.
#[derive(Debug, Deserialize)]
pub struct VariantInput {
    pub size: Option<String>,
    pub color: Option<String>,
    pub stock_quantity: i32,
    pub sku: String,
}

/// Product catalog service: filtered listing plus admin CRUD.
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl ProductCatalogService {
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

    /// Lists active products for the storefront.
    ///
    /// Two-phase filter: the query narrows by category/search/price/color/
    /// stock, then the fetched page is narrowed further by size against each
    /// product's variant set. One extra record is fetched to decide whether
    /// a next page exists, then trimmed before display.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: CatalogFilter) -> Result<CatalogPage, ServiceError> {
        let page = filter.page.max(1);
        let per_page = match filter.per_page {
            0 => self.config.catalog_page_size,
            n => n.min(MAX_PAGE_SIZE),
        };

        let mut query = Product::find().filter(product::Column::IsActive.eq(true));

        if !filter.category_slugs.is_empty() {
            let category_ids: Vec<Uuid> = Category::find()
                .filter(category::Column::Slug.is_in(filter.category_slugs.clone()))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect();
            if category_ids.is_empty() {
                return Ok(CatalogPage {
                    products: Vec::new(),
                    page,
                    per_page,
                    has_next_page: false,
                });
            }
            query = query.filter(product::Column::CategoryId.is_in(category_ids));
        }

        if let Some(term) = &filter.search {
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            product::Entity,
                            product::Column::Name,
                        ))))
                        .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col((
                            product::Entity,
                            product::Column::Description,
                        ))))
                        .like(pattern),
                    ),
            );
        }

        if let Some(min) = filter.price_min {
            query = query.filter(product::Column::BasePrice.gte(min));
        }
        if let Some(max) = filter.price_max {
            query = query.filter(product::Column::BasePrice.lte(max));
        }
        if let Some(featured) = filter.featured {
            query = query.filter(product::Column::IsFeatured.eq(featured));
        }

        if !filter.colors.is_empty() {
            // Case-insensitive substring match, OR-combined across colors.
            let mut color_cond = Condition::any();
            for color in &filter.colors {
                color_cond = color_cond.add(
                    Expr::expr(Func::lower(Expr::col((
                        product_variant::Entity,
                        product_variant::Column::Color,
                    ))))
                    .like(format!("%{}%", color.to_lowercase())),
                );
            }
            let mut sub = SeaQuery::select();
            sub.column(product_variant::Column::ProductId)
                .from(product_variant::Entity)
                .cond_where(color_cond);
            query = query.filter(product::Column::Id.in_subquery(sub.to_owned()));
        }

        if filter.in_stock {
            let mut sub = SeaQuery::select();
            sub.column(product_variant::Column::ProductId)
                .from(product_variant::Entity)
                .cond_where(Expr::col(product_variant::Column::StockQuantity).gt(0));
            query = query.filter(product::Column::Id.in_subquery(sub.to_owned()));
        }

        let fetched = query
            .order_by_desc(product::Column::CreatedAt)
            .limit(per_page + 1)
            .offset((page - 1) * per_page)
            .all(&*self.db)
            .await?;

        let products = self.with_nested(fetched).await?;
        let size_filtered = apply_size_filter(products, &filter.sizes);
        let (products, has_next_page) = trim_lookahead(size_filtered, per_page as usize);

        Ok(CatalogPage {
            products,
            page,
            per_page,
            has_next_page,
        })
    }

    /// Featured products for the homepage rail.
    #[instrument(skip(self))]
    pub async fn featured(&self, limit: u64) -> Result<Vec<CatalogProduct>, ServiceError> {
        let fetched = Product::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::IsFeatured.eq(true))
            .order_by_desc(product::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?;
        self.with_nested(fetched).await
    }

    /// Product detail by slug with selector axes and availability. When
    /// `selected_size` is given, color availability is scoped to it.
    #[instrument(skip(self))]
    pub async fn detail(
        &self,
        slug: &str,
        selected_size: Option<&str>,
    ) -> Result<ProductDetail, ServiceError> {
        let (product, category_slug, images, variants) = self.load_by_slug(slug).await?;

        let kind = ProductKind::resolve(category_slug.as_deref(), &variants);
        let selector_set = catalog::resolve_selectors(kind, &variants);
        let axes = selector_set.axes();
        let SelectorSet {
            options, colors, ..
        } = selector_set;

        let options = options
            .into_iter()
            .map(|value| OptionAvailability {
                available: catalog::is_size_available(&variants, &value),
                value,
            })
            .collect();
        let colors = colors
            .into_iter()
            .map(|value| OptionAvailability {
                available: selected_size
                    .is_some_and(|size| catalog::is_color_available(&variants, size, &value)),
                value,
            })
            .collect();

        let selectors = SelectorView {
            kind,
            axes,
            options,
            colors,
        };

        Ok(ProductDetail {
            product,
            category_slug,
            images,
            variants,
            selectors,
        })
    }

    /// Resolves a size/color selection to a concrete variant, for
    /// add-to-cart by selection. Missing or unmatched selections surface
    /// the kind-appropriate prompt as a validation error.
    #[instrument(skip(self))]
    pub async fn resolve_selection(
        &self,
        slug: &str,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Result<(ProductModel, ProductVariantModel), ServiceError> {
        let (product, category_slug, _, variants) = self.load_by_slug(slug).await?;
        let kind = ProductKind::resolve(category_slug.as_deref(), &variants);

        let variant = catalog::resolve_variant(kind, &variants, size, color)
            .cloned()
            .ok_or_else(|| ServiceError::ValidationError(kind.selection_prompt().to_string()))?;

        Ok((product, variant))
    }

    /// Related products: other active products, newest first.
    #[instrument(skip(self))]
    pub async fn related(
        &self,
        product_id: Uuid,
        limit: u64,
    ) -> Result<Vec<CatalogProduct>, ServiceError> {
        let fetched = Product::find()
            .filter(product::Column::IsActive.eq(true))
            .filter(product::Column::Id.ne(product_id))
            .order_by_desc(product::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?;
        self.with_nested(fetched).await
    }

    /// Creates a product (admin).
    #[instrument(skip(self))]
    pub async fn create(&self, input: CreateProductInput) -> Result<ProductModel, ServiceError> {
        validate_slug(&input.slug)?;
        validate_prices(input.base_price, input.discount_price)?;
        self.ensure_unique_slug(&input.slug, None).await?;
        self.ensure_category_exists(input.category_id).await?;

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            description: Set(input.description),
            category_id: Set(input.category_id),
            base_price: Set(input.base_price),
            discount_price: Set(input.discount_price),
            image_url: Set(input.image_url),
            rating: Set(None),
            reviews_count: Set(None),
            is_featured: Set(input.is_featured),
            is_active: Set(input.is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(model.id))
            .await;
        info!("Created product {} ({})", model.slug, model.id);
        Ok(model)
    }

    /// Updates a product (admin).
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let model = self.get(product_id).await?;

        if let Some(ref slug) = input.slug {
            validate_slug(slug)?;
            self.ensure_unique_slug(slug, Some(product_id)).await?;
        }
        if let Some(category_id) = input.category_id {
            self.ensure_category_exists(category_id).await?;
        }
        let base = input.base_price.unwrap_or(model.base_price);
        let discount = if input.clear_discount_price {
            None
        } else {
            input.discount_price.or(model.discount_price)
        };
        validate_prices(base, discount)?;

        let mut active: product::ActiveModel = model.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(slug) = input.slug {
            active.slug = Set(slug);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(category_id) = input.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(price) = input.base_price {
            active.base_price = Set(price);
        }
        if input.clear_discount_price {
            active.discount_price = Set(None);
        } else if let Some(price) = input.discount_price {
            active.discount_price = Set(Some(price));
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(is_featured) = input.is_featured {
            active.is_featured = Set(is_featured);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let model = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;
        info!("Updated product {}", product_id);
        Ok(model)
    }

    /// Deletes a product (admin). Products referenced by past orders are
    /// soft-disabled instead of removed, so order snapshots keep a valid
    /// origin.
    #[instrument(skip(self))]
    pub async fn delete(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let model = self.get(product_id).await?;

        let referenced = OrderItem::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(&*self.db)
            .await?;

        if referenced > 0 {
            let mut active: product::ActiveModel = model.into();
            active.is_active = Set(false);
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;
            self.event_sender
                .send_or_log(Event::ProductDisabled(product_id))
                .await;
            info!("Disabled product {} (referenced by orders)", product_id);
            return Ok(());
        }

        let txn = self.db.begin().await?;
        CartItem::delete_many()
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        ProductVariant::delete_many()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        ProductImage::delete_many()
            .filter(product_image::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        Product::delete_by_id(product_id).exec(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;
        info!("Deleted product {}", product_id);
        Ok(())
    }

    /// Replaces a product's variant set (admin). Cart lines pointing at the
    /// removed variants are dropped with them.
    #[instrument(skip(self))]
    pub async fn replace_variants(
        &self,
        product_id: Uuid,
        inputs: Vec<VariantInput>,
    ) -> Result<Vec<ProductVariantModel>, ServiceError> {
        self.get(product_id).await?;

        for input in &inputs {
            if input.stock_quantity < 0 {
                return Err(ServiceError::ValidationError(
                    "Stock quantity must not be negative".to_string(),
                ));
            }
            if input.sku.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "SKU must not be empty".to_string(),
                ));
            }
        }
        let mut skus: Vec<&str> = inputs.iter().map(|v| v.sku.as_str()).collect();
        skus.sort_unstable();
        skus.dedup();
        if skus.len() != inputs.len() {
            return Err(ServiceError::ValidationError(
                "SKUs must be unique per product".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let old_ids: Vec<Uuid> = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|v| v.id)
            .collect();
        if !old_ids.is_empty() {
            CartItem::delete_many()
                .filter(cart_item::Column::VariantId.is_in(old_ids.clone()))
                .exec(&txn)
                .await?;
            ProductVariant::delete_many()
                .filter(product_variant::Column::Id.is_in(old_ids))
                .exec(&txn)
                .await?;
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let model = product_variant::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                size: Set(input.size),
                color: Set(input.color),
                stock_quantity: Set(input.stock_quantity),
                sku: Set(input.sku),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
            created.push(model);
        }

        txn.commit().await?;
        info!(
            "Replaced variants for product {}: {} variants",
            product_id,
            created.len()
        );
        Ok(created)
    }

    /// Attaches a gallery image to a product (admin).
    #[instrument(skip(self))]
    pub async fn add_image(
        &self,
        product_id: Uuid,
        image_url: String,
        display_order: i32,
    ) -> Result<ProductImageModel, ServiceError> {
        self.get(product_id).await?;
        product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            image_url: Set(image_url),
            display_order: Set(display_order),
        }
        .insert(&*self.db)
        .await
        .map_err(Into::into)
    }

    pub async fn get(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn load_by_slug(
        &self,
        slug: &str,
    ) -> Result<
        (
            ProductModel,
            Option<String>,
            Vec<ProductImageModel>,
            Vec<ProductVariantModel>,
        ),
        ServiceError,
    > {
        let product = Product::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", slug)))?;

        let category_slug = Category::find_by_id(product.category_id)
            .one(&*self.db)
            .await?
            .map(|c| c.slug);

        let mut images = ProductImage::find()
            .filter(product_image::Column::ProductId.eq(product.id))
            .all(&*self.db)
            .await?;
        images.sort_by_key(|i| i.display_order);

        let variants = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product.id))
            .order_by_asc(product_variant::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok((product, category_slug, images, variants))
    }

    async fn with_nested(
        &self,
        products: Vec<ProductModel>,
    ) -> Result<Vec<CatalogProduct>, ServiceError> {
        let images = products.load_many(ProductImage, &*self.db).await?;
        let variants = products.load_many(ProductVariant, &*self.db).await?;

        Ok(products
            .into_iter()
            .zip(images)
            .zip(variants)
            .map(|((product, mut images), variants)| {
                images.sort_by_key(|i| i.display_order);
                let primary_image_url =
                    primary_image_url(&product, &images, &self.config.placeholder_image_url);
                CatalogProduct {
                    product,
                    images,
                    variants,
                    primary_image_url,
                }
            })
            .collect())
    }

    async fn ensure_unique_slug(
        &self,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = Product::find().filter(product::Column::Slug.eq(slug));
        if let Some(id) = exclude {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Slug {} is already in use",
                slug
            )));
        }
        Ok(())
    }

    async fn ensure_category_exists(&self, category_id: Uuid) -> Result<(), ServiceError> {
        Category::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
    }
}

fn validate_slug(slug: &str) -> Result<(), ServiceError> {
    if !SLUG_RE.is_match(slug) {
        return Err(ServiceError::ValidationError(format!(
            "Slug {} is not URL-safe (lowercase letters, digits and hyphens)",
            slug
        )));
    }
    Ok(())
}

fn validate_prices(base: Decimal, discount: Option<Decimal>) -> Result<(), ServiceError> {
    if base <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Base price must be greater than zero".to_string(),
        ));
    }
    if let Some(d) = discount {
        if d >= base {
            return Err(ServiceError::ValidationError(
                "Discount price must be lower than the base price".to_string(),
            ));
        }
        if d <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Discount price must be greater than zero".to_string(),
            ));
        }
    }
    Ok(())
}

/// Client-side phase of the two-phase filter: keep products whose variant
/// set contains at least one of the selected sizes. An empty selection
/// keeps everything.
fn apply_size_filter(products: Vec<CatalogProduct>, sizes: &[String]) -> Vec<CatalogProduct> {
    if sizes.is_empty() {
        return products;
    }
    products
        .into_iter()
        .filter(|p| {
            p.variants
                .iter()
                .any(|v| v.size.as_deref().is_some_and(|s| sizes.iter().any(|f| f == s)))
        })
        .collect()
}

/// Trims the look-ahead record: the query fetched one row beyond the page
/// size purely to learn whether a next page exists.
fn trim_lookahead<T>(mut items: Vec<T>, per_page: usize) -> (Vec<T>, bool) {
    let has_next = items.len() > per_page;
    if has_next {
        items.truncate(per_page);
    }
    (items, has_next)
}

/// Primary image: first gallery image by display order, then the product's
/// own image, then the placeholder.
fn primary_image_url(
    product: &ProductModel,
    images: &[ProductImageModel],
    placeholder: &str,
) -> String {
    images
        .first()
        .map(|i| i.image_url.clone())
        .or_else(|| product.image_url.clone())
        .unwrap_or_else(|| placeholder.to_string())
}
