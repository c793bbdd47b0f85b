use crate::{
    auth::AdminUser,
    errors::ServiceError,
    handlers::common::{created_response, no_content_response, success_response},
    services::categories::{CreateCategoryInput, UpdateCategoryInput},
    AppState,
};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Public navigation routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_root_categories))
        .route("/:id/subcategories", get(list_subcategories))
}

/// Admin category routes
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_category))
        .route("/:id", put(update_category).delete(delete_category))
}

async fn list_root_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let categories = state.services.categories.list_roots().await?;
    Ok(success_response(categories))
}

async fn list_subcategories(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let categories = state.services.categories.list_children(id).await?;
    Ok(success_response(categories))
}

async fn create_category(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCategoryInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let category = state.services.categories.create(payload).await?;
    Ok(created_response(category))
}

async fn update_category(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryInput>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let category = state.services.categories.update(id, payload).await?;
    Ok(success_response(category))
}

async fn delete_category(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    state.services.categories.delete(id).await?;
    Ok(no_content_response())
}
