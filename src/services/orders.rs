use crate::{
    entities::{
        order, Order, OrderItem, OrderItemModel, OrderModel, OrderStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// An order with its frozen line snapshots.
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Admin listing filter.
#[derive(Debug, Clone, Default)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: u64,
    pub per_page: u64,
}

/// One step of the customer tracking timeline.
#[derive(Debug, Serialize)]
pub struct TrackingStep {
    pub stage: OrderStatus,
    pub completed: bool,
}

/// Customer-facing tracking view derived from the current status.
#[derive(Debug, Serialize)]
pub struct OrderTracking {
    pub order_number: String,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
    pub steps: Vec<TrackingStep>,
}

/// Order retrieval and lifecycle management. Status transitions are
/// enforced here, at the data boundary, regardless of what any admin UI
/// offers.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = order.find_related(OrderItem).all(&*self.db).await?;
        Ok(OrderWithItems { order, items })
    }

    #[instrument(skip(self))]
    pub async fn get_by_number(&self, order_number: &str) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        let items = order.find_related(OrderItem).all(&*self.db).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Admin listing with status and date-range filters, newest first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: OrderListFilter,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let page = filter.page.max(1);
        let per_page = if filter.per_page == 0 {
            20
        } else {
            filter.per_page.min(100)
        };

        let mut query = Order::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(start) = filter.start_date {
            query = query.filter(order::Column::CreatedAt.gte(start));
        }
        if let Some(end) = filter.end_date {
            query = query.filter(order::Column::CreatedAt.lte(end));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;
        Ok((orders, total))
    }

    /// A customer's order history, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderModel>, ServiceError> {
        Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    /// Applies a status transition after checking it against the lifecycle
    /// rules. Illegal moves (forward skips, anything out of a terminal
    /// state, same-state writes) are rejected before any write happens.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            warn!(
                "Rejected status transition {} -> {} for order {}",
                old_status, new_status, order_id
            );
            return Err(ServiceError::ValidationError(format!(
                "Cannot transition order from '{}' to '{}'",
                old_status, new_status
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        info!(
            "Order {} status updated from '{}' to '{}'",
            order_id, old_status, new_status
        );
        Ok(updated)
    }

    /// Updates the admin notes on an order.
    #[instrument(skip(self, notes))]
    pub async fn update_notes(
        &self,
        order_id: Uuid,
        notes: Option<String>,
    ) -> Result<OrderModel, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: order::ActiveModel = order.into();
        active.notes = Set(notes);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await.map_err(Into::into)
    }

    /// Customer tracking view for an order number (guest-accessible).
    #[instrument(skip(self))]
    pub async fn tracking(&self, order_number: &str) -> Result<OrderTracking, ServiceError> {
        let OrderWithItems { order, .. } = self.get_by_number(order_number).await?;
        Ok(build_tracking(&order))
    }
}

fn build_tracking(order: &OrderModel) -> OrderTracking {
    let stages = [
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];
    OrderTracking {
        order_number: order.order_number.clone(),
        status: order.status,
        placed_at: order.created_at,
        steps: stages
            .into_iter()
            .map(|stage| TrackingStep {
                stage,
                completed: order.status.has_reached(stage),
            })
            .collect(),
    }
}
