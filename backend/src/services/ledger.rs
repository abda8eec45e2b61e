//! Stock ledger core
//!
//! The only code path that changes `Product.current_stock`. Every change is
//! paired with an immutable movement recording the stock before and after,
//! inside the caller's unit of work.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{MovementReason, Product, StockMovement};
use shared::ledger::{next_stock, LedgerError};
use crate::store::{found, UnitOfWork};

/// A signed stock change to post against one product
#[derive(Debug, Clone)]
pub struct MovementRequest {
    pub product_id: Uuid,
    /// Positive adds stock, negative removes it
    pub delta: i32,
    pub reason: MovementReason,
    pub reference: Option<Uuid>,
    pub notes: Option<String>,
    pub actor: Uuid,
}

impl MovementRequest {
    pub fn stock_in(
        product_id: Uuid,
        quantity: i32,
        reason: MovementReason,
        reference: Option<Uuid>,
        actor: Uuid,
    ) -> Self {
        Self {
            product_id,
            delta: quantity,
            reason,
            reference,
            notes: None,
            actor,
        }
    }

    pub fn stock_out(
        product_id: Uuid,
        quantity: i32,
        reason: MovementReason,
        reference: Option<Uuid>,
        actor: Uuid,
    ) -> Self {
        Self {
            delta: quantity.saturating_neg(),
            ..Self::stock_in(product_id, quantity, reason, reference, actor)
        }
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// Product as it stands after a movement, and the movement itself
#[derive(Debug, Clone, Serialize)]
pub struct LedgerPosting {
    pub product: Product,
    pub movement: StockMovement,
}

/// Post a stock movement.
///
/// Locks the product, checks the result stays non-negative, writes the new
/// stock guarded on the value read, and appends the movement. A failure
/// leaves the unit of work to be rolled back by the caller; this function
/// never retries.
pub async fn apply_movement(
    uow: &mut dyn UnitOfWork,
    request: MovementRequest,
) -> AppResult<LedgerPosting> {
    if request.delta == 0 {
        return Err(AppError::validation(
            "quantity",
            "Movement quantity cannot be zero",
        ));
    }

    let mut product = found(uow.lock_product(request.product_id).await?, "Product")?;
    let quantity_before = product.current_stock;

    let quantity_after =
        next_stock(quantity_before, request.delta).map_err(|e| match e {
            LedgerError::Insufficient {
                available,
                requested,
            } => AppError::InsufficientStock {
                product_id: product.id,
                available,
                requested,
            },
            other => AppError::validation("quantity", other.to_string()),
        })?;

    if !uow
        .set_product_stock(product.id, quantity_before, quantity_after)
        .await?
    {
        return Err(AppError::conflict(
            "product",
            "Product stock changed concurrently",
        ));
    }

    let movement = StockMovement::record(
        product.id,
        quantity_before,
        quantity_after,
        request.reason,
        request.reference,
        request.notes,
        request.actor,
    );
    uow.insert_movement(&movement).await?;

    tracing::debug!(
        product_id = %product.id,
        delta = request.delta,
        quantity_before,
        quantity_after,
        reason = request.reason.as_str(),
        "Stock movement posted"
    );

    product.current_stock = quantity_after;
    product.updated_at = movement.created_at;
    Ok(LedgerPosting { product, movement })
}
