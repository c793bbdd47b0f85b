use crate::{
    auth::{AuthenticatedUser, CartOwner},
    catalog::{self, CartTotals},
    errors::ServiceError,
    handlers::common::{no_content_response, success_response, validate_input},
    services::{
        cart::{AddToCartInput, CartLineView},
        discounts::AppliedDiscount,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:id", put(update_quantity).delete(remove_item))
        .route("/selection", post(add_by_selection))
        .route("/merge", post(merge_cart))
}

/// Cart response: priced lines, display-rounded totals and the applied
/// discount, if any. At most one code applies; sending a different code
/// replaces the previous one rather than stacking.
#[derive(Debug, Serialize)]
struct CartResponse {
    items: Vec<CartLineView>,
    totals: CartTotals,
    discount: Option<AppliedDiscount>,
}

#[derive(Debug, Deserialize)]
struct CartQuery {
    discount_code: Option<String>,
}

async fn get_cart(
    CartOwner(owner): CartOwner,
    State(state): State<Arc<AppState>>,
    Query(query): Query<CartQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let view = state.services.cart.get_cart(&owner).await?;

    let discount = match query.discount_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => Some(
            state
                .services
                .discounts
                .validate(code, view.totals.subtotal)
                .await?,
        ),
        _ => None,
    };

    let totals = catalog::compute_totals(
        &view.line_amounts(),
        discount.as_ref().map(|d| d.percentage),
        state.config.shipping_policy(),
    );

    Ok(success_response(CartResponse {
        items: view.items,
        totals: totals.display(),
        discount,
    }))
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    product_id: Uuid,
    variant_id: Uuid,
    #[serde(default = "default_quantity")]
    quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

async fn add_item(
    CartOwner(owner): CartOwner,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let item = state
        .services
        .cart
        .add_item(
            &owner,
            AddToCartInput {
                product_id: payload.product_id,
                variant_id: payload.variant_id,
                quantity: payload.quantity,
            },
        )
        .await?;
    Ok(success_response(item))
}

#[derive(Debug, Deserialize)]
struct AddBySelectionRequest {
    product_slug: String,
    size: Option<String>,
    color: Option<String>,
    #[serde(default = "default_quantity")]
    quantity: i32,
}

/// Add-to-cart straight from a size/color selection: the variant is
/// resolved server-side, so an incomplete selection comes back as the
/// kind-appropriate "select size/volume" validation message.
async fn add_by_selection(
    CartOwner(owner): CartOwner,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddBySelectionRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let (product, variant) = state
        .services
        .products
        .resolve_selection(
            &payload.product_slug,
            payload.size.as_deref(),
            payload.color.as_deref(),
        )
        .await?;

    let quantity = catalog::clamp_quantity(payload.quantity, Some(variant.stock_quantity));
    let item = state
        .services
        .cart
        .add_item(
            &owner,
            AddToCartInput {
                product_id: product.id,
                variant_id: variant.id,
                quantity,
            },
        )
        .await?;
    Ok(success_response(item))
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityRequest {
    quantity: i32,
}

async fn update_quantity(
    CartOwner(owner): CartOwner,
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let item = state
        .services
        .cart
        .set_quantity(&owner, item_id, payload.quantity)
        .await?;
    Ok(success_response(item))
}

async fn remove_item(
    CartOwner(owner): CartOwner,
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state.services.cart.remove_item(&owner, item_id).await?;
    Ok(no_content_response())
}

async fn clear_cart(
    CartOwner(owner): CartOwner,
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state.services.cart.clear(&owner).await?;
    Ok(no_content_response())
}

#[derive(Debug, Deserialize, Validate)]
struct MergeCartRequest {
    #[validate(length(min = 1, message = "Session id is required"))]
    session_id: String,
}

/// Folds the anonymous session cart into the authenticated user's cart.
async fn merge_cart(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MergeCartRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    validate_input(&payload)?;
    state
        .services
        .cart
        .merge_session_into_user(&payload.session_id, user.user_id)
        .await?;
    Ok(no_content_response())
}
