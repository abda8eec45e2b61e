//! Customer return models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Workflow status of a return. Stock is restored when the return is filed;
/// the status only tracks approval and refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "return_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Completed,
}

impl ReturnStatus {
    /// Forward-only: PENDING -> APPROVED -> COMPLETED
    pub fn can_transition_to(&self, next: ReturnStatus) -> bool {
        matches!(
            (self, next),
            (ReturnStatus::Pending, ReturnStatus::Approved)
                | (ReturnStatus::Approved, ReturnStatus::Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "PENDING",
            ReturnStatus::Approved => "APPROVED",
            ReturnStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Goods brought back against a sale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleReturn {
    pub id: Uuid,
    pub return_number: String,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub reason: Option<String>,
    pub refund_amount: Decimal,
    pub refund_method: Option<String>,
    pub status: ReturnStatus,
    pub returned_by: Uuid,
    pub notes: Option<String>,
    pub return_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
