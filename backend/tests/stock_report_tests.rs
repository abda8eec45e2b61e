//! Weekly stock report tests

mod common;

use chrono::NaiveDate;
use common::Harness;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stock_ledger_backend::error::AppError;
use stock_ledger_backend::services::products::AdjustStockInput;
use stock_ledger_backend::services::stock_reports::{CloseReportInput, CreateReportInput};

fn week_of(y: i32, m: u32, d: u32) -> CreateReportInput {
    let start_date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
    CreateReportInput {
        start_date,
        end_date: start_date + chrono::Duration::days(6),
        notes: None,
    }
}

#[tokio::test]
async fn test_report_snapshots_opening_stock() {
    let h = Harness::new();
    let a = h.add_product("GREASE", 10, dec!(30), dec!(35)).await;
    let b = h.add_product("HAMMERS", 4, dec!(250), dec!(300)).await;

    let report = h.reports().create(h.actor, week_of(2024, 3, 4)).await.unwrap();

    assert_eq!(report.week_number, 10);
    assert_eq!(report.year, 2024);
    assert_eq!(report.opening_stock[&a.id], 10);
    assert_eq!(report.opening_stock[&b.id], 4);
    assert_eq!(report.total_value, dec!(1300));
    assert!(!report.is_closed());
}

#[tokio::test]
async fn test_snapshot_value_out_of_range_is_refused() {
    let h = Harness::new();
    h.add_product("CRUSHER", 2, Decimal::MAX / dec!(3), dec!(1)).await;
    h.add_product("PUMPING MACHINE", 2, Decimal::MAX / dec!(3), dec!(1)).await;

    let err = h.reports().create(h.actor, week_of(2024, 3, 4)).await.unwrap_err();

    assert!(matches!(err, AppError::Validation { .. }));
    assert!(h.store.state().await.reports.is_empty());
}

#[tokio::test]
async fn test_report_week_comes_from_iso_calendar() {
    let h = Harness::new();
    let report = h.reports().create(h.actor, week_of(2021, 1, 3)).await.unwrap();
    assert_eq!((report.week_number, report.year), (53, 2020));
}

#[tokio::test]
async fn test_duplicate_week_is_refused() {
    let h = Harness::new();
    h.reports().create(h.actor, week_of(2024, 3, 4)).await.unwrap();

    // Any day of the same ISO week collides
    let err = h
        .reports()
        .create(h.actor, week_of(2024, 3, 7))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEntry(_)));
}

#[tokio::test]
async fn test_end_before_start_is_refused() {
    let h = Harness::new();
    let mut input = week_of(2024, 3, 4);
    input.end_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let err = h.reports().create(h.actor, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_close_and_variance() {
    let h = Harness::new();
    let a = h.add_product("GREASE", 10, dec!(30), dec!(35)).await;
    let b = h.add_product("HAMMERS", 4, dec!(250), dec!(300)).await;
    let report = h.reports().create(h.actor, week_of(2024, 3, 4)).await.unwrap();

    h.products()
        .adjust_stock(h.actor, a.id, AdjustStockInput { quantity: -2, notes: None })
        .await
        .unwrap();
    h.products()
        .adjust_stock(h.actor, b.id, AdjustStockInput { quantity: 3, notes: None })
        .await
        .unwrap();
    let movements_before = h.store.state().await.movements.len();

    let closed = h
        .reports()
        .close(
            h.actor,
            report.id,
            CloseReportInput {
                notes: Some("Counted".to_string()),
            },
        )
        .await
        .unwrap();
    assert!(closed.is_closed());
    assert_eq!(closed.closing_stock[&a.id], 8);
    assert_eq!(closed.closing_stock[&b.id], 7);
    assert_eq!(closed.total_value, dec!(1990));

    let variance = h.reports().variance(report.id).await.unwrap();
    assert_eq!(variance.variances.len(), 2);
    // Largest absolute change first
    assert_eq!(variance.variances[0].product_id, b.id);
    assert_eq!(variance.variances[0].variance, 3);
    assert_eq!(variance.variances[0].variance_value, dec!(750));
    assert_eq!(variance.variances[1].variance, -2);
    assert_eq!(variance.variances[1].variance_value, dec!(-60));

    let err = h
        .reports()
        .close(h.actor, report.id, CloseReportInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidStateTransition(_)));

    // Reports only read stock
    let state = h.store.state().await;
    assert_eq!(state.movements.len(), movements_before);
    assert_eq!(state.products[&a.id].current_stock, 8);
}

#[tokio::test]
async fn test_current_report_is_created_once() {
    let h = Harness::new();
    h.add_product("GREASE", 10, dec!(30), dec!(35)).await;

    let first = h.reports().current().await.unwrap();
    let second = h.reports().current().await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.end_date - first.start_date, chrono::Duration::days(6));
    assert_eq!(h.store.state().await.reports.len(), 1);
}

#[tokio::test]
async fn test_unknown_report_is_not_found() {
    let h = Harness::new();
    let err = h.reports().get(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
