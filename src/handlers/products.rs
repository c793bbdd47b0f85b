use crate::{
    auth::AdminUser,
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, split_csv, success_response},
    services::products::{
        CatalogFilter, CreateProductInput, UpdateProductInput, VariantInput,
    },
    AppState,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Public catalog routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/featured", get(featured_products))
        .route("/:slug", get(product_detail))
        .route("/:slug/related", get(related_products))
}

/// Admin catalog routes
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", put(update_product).delete(delete_product))
        .route("/:id/variants", put(replace_variants))
        .route("/:id/images", post(upload_product_image))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    /// Comma-separated category slugs
    category: Option<String>,
    /// Comma-separated color selections
    colors: Option<String>,
    /// Comma-separated size selections (client-side phase of the filter)
    sizes: Option<String>,
    search: Option<String>,
    price_min: Option<Decimal>,
    price_max: Option<Decimal>,
    in_stock: Option<bool>,
    featured: Option<bool>,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let filter = CatalogFilter {
        category_slugs: split_csv(query.category.as_deref()),
        search: query.search,
        price_min: query.price_min,
        price_max: query.price_max,
        colors: split_csv(query.colors.as_deref()),
        sizes: split_csv(query.sizes.as_deref()),
        in_stock: query.in_stock.unwrap_or(false),
        featured: query.featured,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(0),
    };
    let page = state.services.products.list(filter).await?;
    Ok(success_response(page))
}

#[derive(Debug, Deserialize)]
struct FeaturedQuery {
    limit: Option<u64>,
}

async fn featured_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeaturedQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let products = state
        .services
        .products
        .featured(query.limit.unwrap_or(4).min(20))
        .await?;
    Ok(success_response(products))
}

#[derive(Debug, Deserialize)]
struct DetailQuery {
    /// When set, color availability in the response is scoped to this size.
    size: Option<String>,
}

async fn product_detail(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let detail = state
        .services
        .products
        .detail(&slug, query.size.as_deref())
        .await?;
    Ok(success_response(detail))
}

async fn related_products(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let detail = state.services.products.detail(&slug, None).await?;
    let related = state.services.products.related(detail.product.id, 4).await?;
    Ok(success_response(related))
}

async fn create_product(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let product = state.services.products.create(payload).await?;
    Ok(created_response(product))
}

async fn update_product(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let product = state.services.products.update(id, payload).await?;
    Ok(success_response(product))
}

async fn delete_product(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state.services.products.delete(id).await?;
    Ok(no_content_response())
}

async fn replace_variants(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<Vec<VariantInput>>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let variants = state.services.products.replace_variants(id, payload).await?;
    Ok(success_response(variants))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    file_name: String,
    #[serde(default)]
    display_order: i32,
}

/// Accepts the raw image bytes as the request body; the file name arrives
/// as a query parameter. The bytes go straight to the object store.
async fn upload_product_image(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    if body.is_empty() {
        return Err(ServiceError::ValidationError(
            "Image body must not be empty".to_string(),
        ));
    }
    let url = state
        .services
        .media
        .upload("products", &query.file_name, &body)
        .await?;
    let image = state
        .services
        .products
        .add_image(id, url, query.display_order)
        .await?;
    Ok(created_response(image))
}
