//! HTTP handlers

pub mod activity;
pub mod auth;
pub mod health;
pub mod inventory;
pub mod lenders;
pub mod products;
pub mod returns;
pub mod sales;
pub mod stock_reports;

pub use activity::*;
pub use auth::*;
pub use health::*;
pub use inventory::*;
pub use lenders::*;
pub use products::*;
pub use returns::*;
pub use sales::*;
pub use stock_reports::*;

use axum::http::HeaderMap;

/// Client address as reported by the fronting proxy
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}
