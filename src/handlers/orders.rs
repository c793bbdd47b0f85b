use crate::{
    auth::{AdminUser, AuthenticatedUser, Role},
    entities::OrderStatus,
    errors::ServiceError,
    handlers::common::success_response,
    services::orders::OrderListFilter,
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Customer order routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/track/:order_number", get(track_order))
        .route("/mine", get(my_orders))
        .route("/:id", get(get_order))
}

/// Admin order routes
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(admin_get_order))
        .route("/:id/status", put(update_status))
        .route("/:id/notes", put(update_notes))
}

/// Guest-accessible tracking by order number: shows the status timeline,
/// nothing else.
async fn track_order(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let tracking = state.services.orders.tracking(&order_number).await?;
    Ok(success_response(tracking))
}

async fn my_orders(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let orders = state.services.orders.list_for_user(user.user_id).await?;
    Ok(success_response(orders))
}

/// Full order view for its owner (or an admin).
async fn get_order(
    user: AuthenticatedUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state.services.orders.get(id).await?;
    let is_owner = order.order.user_id == Some(user.user_id);
    if !is_owner && user.role != Role::Admin {
        // Indistinguishable from a missing order on purpose.
        return Err(ServiceError::NotFound(format!("Order {} not found", id)));
    }
    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct OrderListQuery {
    status: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_orders(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<OrderListQuery>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;

    let (orders, total) = state
        .services
        .orders
        .list(OrderListFilter {
            status,
            start_date: query.start_date,
            end_date: query.end_date,
            page: query.page.unwrap_or(1),
            per_page: query.per_page.unwrap_or(20),
        })
        .await?;

    Ok(success_response(serde_json::json!({
        "orders": orders,
        "total": total,
    })))
}

async fn admin_get_order(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state.services.orders.get(id).await?;
    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: String,
}

async fn update_status(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let status = parse_status(&payload.status)?;
    let order = state.services.orders.update_status(id, status).await?;
    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct UpdateNotesRequest {
    notes: Option<String>,
}

async fn update_notes(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateNotesRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let order = state.services.orders.update_notes(id, payload.notes).await?;
    Ok(success_response(order))
}

fn parse_status(value: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(value)
        .map_err(|_| ServiceError::ValidationError(format!("Unknown order status: {}", value)))
}
