use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Order entity. Customer contact fields are a snapshot taken at order time
/// and never follow later profile edits.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    #[sea_orm(nullable)]
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub discount_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order status lifecycle.
///
/// The only legal paths are pending -> confirmed -> shipped -> delivered,
/// with cancellation allowed from pending or confirmed. Delivered and
/// cancelled are terminal. Forward skips (e.g. pending -> shipped) are
/// rejected at the data boundary, not just in the admin UI.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Whether a direct transition to `next` is legal.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Shipped, Delivered)
        )
    }

    /// Delivered and cancelled orders accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Position along the fulfilment path, used by the customer tracking
    /// view. Cancelled orders have no forward progress.
    pub fn progress_rank(self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    /// Whether the fulfilment stage `stage` has been reached.
    pub fn has_reached(self, stage: OrderStatus) -> bool {
        match (self.progress_rank(), stage.progress_rank()) {
            (Some(current), Some(target)) => current >= target,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;
    use std::str::FromStr;

    #[test]
    fn forward_path_is_allowed_step_by_step() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
    }

    #[test]
    fn forward_skips_are_rejected() {
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Pending.can_transition_to(Delivered));
        assert!(!Confirmed.can_transition_to(Delivered));
    }

    #[test]
    fn cancellation_only_from_pending_or_confirmed() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for next in [Pending, Confirmed, Shipped, Delivered, Cancelled] {
            assert!(!Delivered.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Shipped.is_terminal());
    }

    #[test]
    fn no_backward_transitions() {
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Shipped.can_transition_to(Confirmed));
        assert!(!Delivered.can_transition_to(Shipped));
    }

    #[test]
    fn same_state_is_not_a_transition() {
        for s in [Pending, Confirmed, Shipped, Delivered, Cancelled] {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn tracking_progress_marks_reached_stages() {
        assert!(Shipped.has_reached(Confirmed));
        assert!(Shipped.has_reached(Shipped));
        assert!(!Shipped.has_reached(Delivered));
        assert!(!Cancelled.has_reached(Confirmed));
    }

    #[test]
    fn parses_snake_case_status_strings() {
        assert_eq!(OrderStatus::from_str("pending").unwrap(), Pending);
        assert_eq!(OrderStatus::from_str("cancelled").unwrap(), Cancelled);
        assert!(OrderStatus::from_str("refunded").is_err());
        assert_eq!(Shipped.to_string(), "shipped");
    }
}
