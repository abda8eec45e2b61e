//! Pure stock ledger arithmetic
//!
//! The backend's ledger core delegates every stock calculation to this module
//! so the rules can be tested without a database: stock never goes negative,
//! each movement's `quantity_after` equals `quantity_before + quantity`, and
//! replaying a product's movements from its opening stock reproduces its
//! current stock.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{MovementType, StockMovement};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Movement quantity cannot be zero")]
    ZeroDelta,

    #[error("Insufficient stock: {available} available, {requested} requested")]
    Insufficient { available: i32, requested: i32 },

    #[error("Stock quantity out of range")]
    Overflow,
}

/// Stock after applying a signed `delta` to `current`
pub fn next_stock(current: i32, delta: i32) -> Result<i32, LedgerError> {
    if delta == 0 {
        return Err(LedgerError::ZeroDelta);
    }
    let next = current.checked_add(delta).ok_or(LedgerError::Overflow)?;
    if next < 0 {
        return Err(LedgerError::Insufficient {
            available: current,
            requested: delta.saturating_neg(),
        });
    }
    Ok(next)
}

/// A movement that breaks the ledger chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerDiscrepancy {
    pub movement_id: Uuid,
    pub expected_before: i32,
    pub recorded_before: i32,
    pub recorded_after: i32,
    pub quantity: i32,
}

/// Result of replaying a product's movement history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerAudit {
    pub product_id: Uuid,
    pub opening_stock: i32,
    pub current_stock: i32,
    pub replayed_stock: i64,
    pub movement_count: usize,
    pub discrepancies: Vec<LedgerDiscrepancy>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty() && self.replayed_stock == i64::from(self.current_stock)
    }
}

/// Replay `movements` (oldest first) from `opening_stock` and compare against
/// `current_stock`
pub fn audit(
    product_id: Uuid,
    opening_stock: i32,
    current_stock: i32,
    movements: &[StockMovement],
) -> LedgerAudit {
    let mut running = i64::from(opening_stock);
    let mut discrepancies = Vec::new();

    for m in movements {
        let sign_ok = match m.movement_type {
            MovementType::In => m.quantity > 0,
            MovementType::Out => m.quantity < 0,
        };
        let chain_ok = i64::from(m.quantity_before) == running
            && i64::from(m.quantity_before) + i64::from(m.quantity) == i64::from(m.quantity_after);

        if !sign_ok || !chain_ok {
            discrepancies.push(LedgerDiscrepancy {
                movement_id: m.id,
                expected_before: running.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
                recorded_before: m.quantity_before,
                recorded_after: m.quantity_after,
                quantity: m.quantity,
            });
        }
        running += i64::from(m.quantity);
    }

    LedgerAudit {
        product_id,
        opening_stock,
        current_stock,
        replayed_stock: running,
        movement_count: movements.len(),
        discrepancies,
    }
}
