//! Stock movement models
//!
//! A movement is an immutable ledger line. Quantities are stored as signed
//! deltas: stock coming in is positive, stock going out is negative, and the
//! movement type is derived from the sign.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "movement_type", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    /// Type implied by a signed delta. Zero deltas are never recorded.
    pub fn from_delta(delta: i32) -> Self {
        if delta < 0 {
            MovementType::Out
        } else {
            MovementType::In
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
        }
    }
}

/// Why stock moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "movement_reason", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementReason {
    /// Additional stock bought in
    Purchase,
    Sale,
    Return,
    /// Manual correction or a compensating entry
    Adjustment,
}

impl MovementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::Purchase => "PURCHASE",
            MovementReason::Sale => "SALE",
            MovementReason::Return => "RETURN",
            MovementReason::Adjustment => "ADJUSTMENT",
        }
    }
}

/// An immutable stock ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    /// Signed delta applied to the product's stock
    pub quantity: i32,
    pub quantity_before: i32,
    pub quantity_after: i32,
    pub reason: MovementReason,
    /// Id of the sale, return or purchase batch that caused the movement
    pub reference: Option<Uuid>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Build the ledger line for a delta that has already been validated
    pub fn record(
        product_id: Uuid,
        quantity_before: i32,
        quantity_after: i32,
        reason: MovementReason,
        reference: Option<Uuid>,
        notes: Option<String>,
        created_by: Uuid,
    ) -> Self {
        let quantity = quantity_after - quantity_before;
        Self {
            id: Uuid::new_v4(),
            product_id,
            movement_type: MovementType::from_delta(quantity),
            quantity,
            quantity_before,
            quantity_after,
            reason,
            reference,
            notes,
            created_by,
            created_at: Utc::now(),
        }
    }

    /// Unsigned number of units moved
    pub fn magnitude(&self) -> i32 {
        self.quantity.abs()
    }
}
