//! Business logic services for the stock ledger
//!
//! Write paths run inside a [`Transactor`](crate::store::Transactor) unit of
//! work; read paths go through [`QueryService`].

use chrono::Utc;
use uuid::Uuid;

pub mod activity;
pub mod additional_stock;
pub mod auth;
pub mod ledger;
pub mod lenders;
pub mod products;
pub mod queries;
pub mod returns;
pub mod sales;
pub mod stock_reports;

pub use activity::{ActivityService, ActivitySink, MemoryActivitySink, PgActivitySink};
pub use additional_stock::AdditionalStockService;
pub use auth::AuthService;
pub use lenders::LenderService;
pub use products::ProductService;
pub use queries::QueryService;
pub use returns::ReturnsService;
pub use sales::SalesService;
pub use stock_reports::StockReportService;

/// Human-readable document number such as `SALE-1718000000000-3FA2`
pub(crate) fn document_number(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().timestamp_millis(),
        suffix[..4].to_uppercase()
    )
}
