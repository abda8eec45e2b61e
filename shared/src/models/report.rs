//! Weekly stock report models
//!
//! Reports are read-only consumers of the ledger: they capture product stock
//! levels when a week is opened and again when it is closed.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Product, StockLevel};

/// Opening and closing stock snapshot for one ISO week
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WeeklyStockReport {
    pub id: Uuid,
    pub week_number: i32,
    pub year: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// product id -> stock when the report was opened
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub opening_stock: BTreeMap<Uuid, i32>,
    /// product id -> stock when the report was closed; empty while open
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub closing_stock: BTreeMap<Uuid, i32>,
    /// Stock valued at cost at the latest snapshot
    pub total_value: Decimal,
    pub notes: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WeeklyStockReport {
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// A point-in-time stock snapshot with its value at cost
#[derive(Debug, Clone, PartialEq)]
pub struct StockSnapshot {
    pub quantities: BTreeMap<Uuid, i32>,
    pub total_value: Decimal,
}

impl StockSnapshot {
    pub fn capture(levels: &[StockLevel]) -> Result<Self, &'static str> {
        let quantities = levels
            .iter()
            .map(|level| (level.product_id, level.current_stock))
            .collect();
        let total_value = levels.iter().try_fold(Decimal::ZERO, |total, level| {
            Decimal::from(level.current_stock)
                .checked_mul(level.cost_price)
                .and_then(|value| total.checked_add(value))
                .ok_or("Stock value out of range")
        })?;
        Ok(Self {
            quantities,
            total_value,
        })
    }
}

/// Change in a product's stock over a report week
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockVariance {
    pub product_id: Uuid,
    pub product_name: String,
    pub opening: i32,
    pub closing: i32,
    pub variance: i32,
    pub variance_value: Decimal,
}

/// Per-product variance for every product in the opening snapshot, largest
/// absolute change first
pub fn compute_variances(
    report: &WeeklyStockReport,
    products: &[Product],
) -> Result<Vec<StockVariance>, &'static str> {
    let mut variances = products
        .iter()
        .filter(|p| report.opening_stock.contains_key(&p.id))
        .map(|p| {
            let opening = report.opening_stock.get(&p.id).copied().unwrap_or(0);
            let closing = report.closing_stock.get(&p.id).copied().unwrap_or(0);
            let variance = closing - opening;
            Decimal::from(variance)
                .checked_mul(p.cost_price)
                .map(|variance_value| StockVariance {
                    product_id: p.id,
                    product_name: p.item_name.clone(),
                    opening,
                    closing,
                    variance,
                    variance_value,
                })
                .ok_or("Variance value out of range")
        })
        .collect::<Result<Vec<_>, _>>()?;

    variances.sort_by(|a, b| b.variance.abs().cmp(&a.variance.abs()));
    Ok(variances)
}

/// ISO-8601 week number and week-numbering year of `date`
///
/// Weeks start on Monday and week 1 is the week containing the year's first
/// Thursday, so early January can belong to the previous year's last week.
pub fn iso_week_of(date: NaiveDate) -> (i32, i32) {
    let week = date.iso_week();
    (week.week() as i32, week.year())
}

/// Monday and Sunday of the ISO week containing `date`
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_iso_week_mid_year() {
        assert_eq!(iso_week_of(date(2024, 6, 12)), (24, 2024));
    }

    #[test]
    fn test_iso_week_year_boundaries() {
        // Sunday 3 Jan 2021 still belongs to week 53 of 2020
        assert_eq!(iso_week_of(date(2021, 1, 3)), (53, 2020));
        assert_eq!(iso_week_of(date(2021, 1, 4)), (1, 2021));
        // Monday 30 Dec 2024 opens week 1 of 2025
        assert_eq!(iso_week_of(date(2024, 12, 30)), (1, 2025));
    }

    #[test]
    fn test_week_bounds() {
        let (start, end) = week_bounds(date(2024, 6, 12));
        assert_eq!(start, date(2024, 6, 10));
        assert_eq!(end, date(2024, 6, 16));

        let (start, _) = week_bounds(date(2024, 6, 10));
        assert_eq!(start, date(2024, 6, 10));
    }

    #[test]
    fn test_snapshot_value() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let snapshot = StockSnapshot::capture(&[
            StockLevel {
                product_id: a,
                current_stock: 10,
                cost_price: dec!(5),
            },
            StockLevel {
                product_id: b,
                current_stock: 2,
                cost_price: dec!(2800),
            },
        ])
        .unwrap();
        assert_eq!(snapshot.quantities.get(&a), Some(&10));
        assert_eq!(snapshot.total_value, dec!(5650));
    }

    #[test]
    fn test_snapshot_value_out_of_range() {
        let level = |cost_price| StockLevel {
            product_id: Uuid::new_v4(),
            current_stock: 2,
            cost_price,
        };
        let levels = [level(Decimal::MAX / dec!(3)), level(Decimal::MAX / dec!(3))];
        assert!(StockSnapshot::capture(&levels).is_err());
    }
}
