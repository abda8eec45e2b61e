//! Purchase batch ("additional stock") models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::iso_week_of;

/// A batch of stock bought in from a supplier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AdditionalStock {
    pub id: Uuid,
    pub batch_number: String,
    pub product_id: Uuid,
    pub quantity: i32,
    pub cost_per_unit: Decimal,
    pub total_cost: Decimal,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub purchase_date: NaiveDate,
    /// ISO week of `purchase_date`
    pub week_number: i32,
    /// ISO week-numbering year of `purchase_date`
    pub year: i32,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdditionalStock {
    /// Cost of `quantity` units bought at `cost_per_unit`
    pub fn cost_of(quantity: i32, cost_per_unit: Decimal) -> Result<Decimal, &'static str> {
        Decimal::from(quantity)
            .checked_mul(cost_per_unit)
            .ok_or("Total cost out of range")
    }

    /// Recompute derived fields after quantity, cost or date changed
    pub fn refresh_derived(&mut self) -> Result<(), &'static str> {
        self.total_cost = Self::cost_of(self.quantity, self.cost_per_unit)?;
        let (week_number, year) = iso_week_of(self.purchase_date);
        self.week_number = week_number;
        self.year = year;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn batch(quantity: i32, cost_per_unit: Decimal) -> AdditionalStock {
        let now = Utc::now();
        AdditionalStock {
            id: Uuid::new_v4(),
            batch_number: "BATCH-1".to_string(),
            product_id: Uuid::new_v4(),
            quantity,
            cost_per_unit,
            total_cost: Decimal::ZERO,
            supplier: None,
            invoice_number: None,
            purchase_date: NaiveDate::from_ymd_opt(2021, 1, 3).unwrap(),
            week_number: 0,
            year: 0,
            notes: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_refresh_derived() {
        let mut b = batch(12, dec!(4.25));
        b.refresh_derived().unwrap();
        assert_eq!(b.total_cost, dec!(51.00));
        assert_eq!((b.week_number, b.year), (53, 2020));
    }

    #[test]
    fn test_cost_overflow_is_an_error() {
        assert!(AdditionalStock::cost_of(3, Decimal::MAX).is_err());
        let mut b = batch(3, Decimal::MAX);
        assert!(b.refresh_derived().is_err());
    }
}
