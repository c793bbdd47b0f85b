use crate::{
    entities::{discount_code, DiscountCode, DiscountCodeModel},
    errors::ServiceError,
    money,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
    sea_query::{Expr, Func},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Why a discount code was refused. Unknown and inactive codes are
/// indistinguishable to the customer on purpose.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscountRejection {
    #[error("Invalid discount code")]
    UnknownCode,
    #[error("This discount code has expired")]
    Expired,
    #[error("This discount code has reached its usage limit")]
    UsageLimitReached,
    #[error("A minimum purchase of {0} is required for this code")]
    MinPurchaseNotMet(Decimal),
}

/// A successfully validated code with the amount it takes off the given
/// subtotal. Validation never consumes a use; only order placement does.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedDiscount {
    pub id: Uuid,
    pub code: String,
    pub percentage: Decimal,
    pub amount: Decimal,
}

/// Checks a fetched code against the business rules, in order, short-
/// circuiting on the first failure: active, not expired, under the usage
/// cap, minimum purchase met. Returns the discount amount on success.
pub fn evaluate(
    code: Option<&DiscountCodeModel>,
    now: DateTime<Utc>,
    subtotal: Decimal,
) -> Result<Decimal, DiscountRejection> {
    let code = code.ok_or(DiscountRejection::UnknownCode)?;
    if !code.is_active {
        return Err(DiscountRejection::UnknownCode);
    }
    if let Some(expiry) = code.expiry_date {
        if expiry <= now {
            return Err(DiscountRejection::Expired);
        }
    }
    if code.usage_exhausted() {
        return Err(DiscountRejection::UsageLimitReached);
    }
    if let Some(min) = code.min_purchase {
        if subtotal < min {
            return Err(DiscountRejection::MinPurchaseNotMet(min));
        }
    }
    Ok(money::percent_of(subtotal, code.percentage).min(subtotal))
}

/// Input for creating a discount code
#[derive(Debug, Deserialize)]
pub struct CreateDiscountInput {
    pub code: String,
    pub percentage: Decimal,
    pub min_purchase: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Input for updating a discount code
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDiscountInput {
    pub percentage: Option<Decimal>,
    pub min_purchase: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Discount code validation and administration.
#[derive(Clone)]
pub struct DiscountService {
    db: Arc<DatabaseConnection>,
}

impl DiscountService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Validates a code against the current subtotal. Read-only: repeated
    /// validation attempts (re-typing a code) never consume uses.
    #[instrument(skip(self))]
    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
    ) -> Result<AppliedDiscount, ServiceError> {
        self.validate_on(&*self.db, code, subtotal).await
    }

    /// Validation against an explicit connection, so checkout can re-check
    /// inside its transaction.
    pub async fn validate_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        code: &str,
        subtotal: Decimal,
    ) -> Result<AppliedDiscount, ServiceError> {
        let model = Self::find_by_code(conn, code).await?;
        match evaluate(model.as_ref(), Utc::now(), subtotal) {
            Ok(amount) => {
                let model = model.expect("evaluate succeeded on a present code");
                Ok(AppliedDiscount {
                    id: model.id,
                    code: model.code,
                    percentage: model.percentage,
                    amount,
                })
            }
            Err(rejection) => {
                warn!("Discount code {} rejected: {}", code, rejection);
                Err(ServiceError::ValidationError(rejection.to_string()))
            }
        }
    }

    /// Consumes one use of a code, exactly once per successful order. The
    /// increment is a compare-and-set against the usage count read in this
    /// transaction; losing the race surfaces as a conflict, never as a
    /// silent over-redemption.
    pub async fn consume<C: ConnectionTrait>(
        &self,
        conn: &C,
        discount_id: Uuid,
    ) -> Result<(), ServiceError> {
        let model = DiscountCode::find_by_id(discount_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Discount code {} not found", discount_id))
            })?;

        if model.usage_exhausted() {
            return Err(ServiceError::Conflict(
                "This discount code has reached its usage limit".to_string(),
            ));
        }

        let result = DiscountCode::update_many()
            .col_expr(
                discount_code::Column::CurrentUses,
                Expr::value(model.current_uses + 1),
            )
            .filter(discount_code::Column::Id.eq(discount_id))
            .filter(discount_code::Column::CurrentUses.eq(model.current_uses))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "This discount code was just redeemed elsewhere".to_string(),
            ));
        }
        Ok(())
    }

    async fn find_by_code<C: ConnectionTrait>(
        conn: &C,
        code: &str,
    ) -> Result<Option<DiscountCodeModel>, ServiceError> {
        // Codes match case-insensitively.
        DiscountCode::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(discount_code::Column::Code)))
                    .eq(code.trim().to_lowercase()),
            )
            .one(conn)
            .await
            .map_err(Into::into)
    }

    /// Lists all codes, newest first (admin).
    pub async fn list(&self) -> Result<Vec<DiscountCodeModel>, ServiceError> {
        DiscountCode::find()
            .order_by_desc(discount_code::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    /// Creates a discount code (admin).
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        input: CreateDiscountInput,
    ) -> Result<DiscountCodeModel, ServiceError> {
        let code = input.code.trim().to_string();
        if code.is_empty() {
            return Err(ServiceError::ValidationError(
                "Code must not be empty".to_string(),
            ));
        }
        if input.percentage <= Decimal::ZERO || input.percentage > Decimal::ONE_HUNDRED {
            return Err(ServiceError::ValidationError(
                "Percentage must be between 0 and 100".to_string(),
            ));
        }
        if Self::find_by_code(&*self.db, &code).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Discount code {} already exists",
                code
            )));
        }

        let model = discount_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            percentage: Set(input.percentage),
            min_purchase: Set(input.min_purchase),
            max_uses: Set(input.max_uses),
            current_uses: Set(0),
            expiry_date: Set(input.expiry_date),
            is_active: Set(input.is_active),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        info!("Created discount code {}", model.code);
        Ok(model)
    }

    /// Updates a discount code (admin). The code string itself and the
    /// usage counter are immutable here.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        discount_id: Uuid,
        input: UpdateDiscountInput,
    ) -> Result<DiscountCodeModel, ServiceError> {
        let model = DiscountCode::find_by_id(discount_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Discount code {} not found", discount_id))
            })?;

        if let Some(pct) = input.percentage {
            if pct <= Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                return Err(ServiceError::ValidationError(
                    "Percentage must be between 0 and 100".to_string(),
                ));
            }
        }

        let mut active: discount_code::ActiveModel = model.into();
        if let Some(pct) = input.percentage {
            active.percentage = Set(pct);
        }
        if let Some(min) = input.min_purchase {
            active.min_purchase = Set(Some(min));
        }
        if let Some(max) = input.max_uses {
            active.max_uses = Set(Some(max));
        }
        if let Some(expiry) = input.expiry_date {
            active.expiry_date = Set(Some(expiry));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }

        active.update(&*self.db).await.map_err(Into::into)
    }

    /// Deletes a discount code (admin).
    pub async fn delete(&self, discount_id: Uuid) -> Result<(), ServiceError> {
        let result = DiscountCode::delete_by_id(discount_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Discount code {} not found",
                discount_id
            )));
        }
        Ok(())
    }
}
