use crate::{
    auth::CartOwner,
    errors::ServiceError,
    handlers::common::created_response,
    services::{cart::OwnerKey, checkout::PlaceOrderInput},
    AppState,
};
use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(place_order))
}

/// Places an order for the owner's cart. Guest checkout works through the
/// session owner; authenticated carts get the user id attached to the
/// order for later history lookups.
async fn place_order(
    CartOwner(owner): CartOwner,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PlaceOrderInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let user_id = match &owner {
        OwnerKey::User(id) => Some(*id),
        OwnerKey::Session(_) => None,
    };
    let placed = state
        .services
        .checkout
        .place_order(&owner, user_id, payload)
        .await?;
    Ok(created_response(placed))
}
