use crate::{
    auth::AdminUser,
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, success_response},
    services::discounts::{CreateDiscountInput, UpdateDiscountInput},
    AppState,
};
use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Admin discount code routes
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_discounts).post(create_discount))
        .route("/:id", put(update_discount).delete(delete_discount))
}

async fn list_discounts(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let codes = state.services.discounts.list().await?;
    Ok(success_response(codes))
}

async fn create_discount(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDiscountInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let code = state.services.discounts.create(payload).await?;
    Ok(created_response(code))
}

async fn update_discount(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDiscountInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let code = state.services.discounts.update(id, payload).await?;
    Ok(success_response(code))
}

async fn delete_discount(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state.services.discounts.delete(id).await?;
    Ok(no_content_response())
}
