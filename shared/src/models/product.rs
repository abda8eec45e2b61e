//! Product catalogue models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stocked product
///
/// `current_stock` is owned by the stock ledger: it only changes through a
/// recorded movement. `opening_stock` is the quantity the product was created
/// with, which is the starting point when the movement history is replayed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Uuid,
    pub item_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub barcode: Option<String>,
    pub units: Option<String>,
    pub location_name: Option<String>,
    pub opening_stock: i32,
    pub current_stock: i32,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub reorder_level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Stock at or below the reorder level
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.reorder_level
    }
}

/// Stock level of one product at a point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub product_id: Uuid,
    pub current_stock: i32,
    pub cost_price: Decimal,
}

impl From<&Product> for StockLevel {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            current_stock: product.current_stock,
            cost_price: product.cost_price,
        }
    }
}
