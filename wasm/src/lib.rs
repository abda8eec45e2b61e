//! WebAssembly module for the Stock Ledger point of sale
//!
//! Lets the till preview what the server will compute:
//! - Sale totals and payment status
//! - Payments applied to an open sale
//! - Stock left after a movement
//! - ISO week of a purchase or report date

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

pub use shared::ledger::next_stock;
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

#[wasm_bindgen(start)]
pub fn init() {}

fn parse_amount(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|_| format!("{} is not a valid amount", field))
}

fn sale_totals_json(quantity: i32, unit_price: &str, amount_paid: &str) -> Result<String, String> {
    let unit_price = parse_amount("unit_price", unit_price)?;
    let amount_paid = parse_amount("amount_paid", amount_paid)?;
    let totals = SaleTotals::compute(quantity, unit_price, amount_paid)?;
    serde_json::to_string(&totals).map_err(|e| e.to_string())
}

fn payment_json(total_amount: &str, amount_paid: &str, increment: &str) -> Result<String, String> {
    let application = PaymentApplication::apply(
        parse_amount("total_amount", total_amount)?,
        parse_amount("amount_paid", amount_paid)?,
        parse_amount("increment", increment)?,
    )?;
    serde_json::to_string(&application).map_err(|e| e.to_string())
}

fn iso_week_parts(year: i32, month: u32, day: u32) -> Option<Vec<i32>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let (week, iso_year) = iso_week_of(date);
    Some(vec![week, iso_year])
}

/// Totals for a sale line as JSON (`total_amount`, `amount_due`, `payment_status`, ...)
#[wasm_bindgen]
pub fn compute_sale_totals(
    quantity: i32,
    unit_price: &str,
    amount_paid: &str,
) -> Result<String, JsValue> {
    sale_totals_json(quantity, unit_price, amount_paid).map_err(|e| JsValue::from_str(&e))
}

/// Outcome of paying `increment` towards a sale, as JSON
#[wasm_bindgen]
pub fn preview_payment(
    total_amount: &str,
    amount_paid: &str,
    increment: &str,
) -> Result<String, JsValue> {
    payment_json(total_amount, amount_paid, increment).map_err(|e| JsValue::from_str(&e))
}

/// PAID, PARTIAL or UNPAID for the given amounts
#[wasm_bindgen]
pub fn payment_status_for(amount_paid: &str, amount_due: &str) -> String {
    let paid = Decimal::from_str(amount_paid).unwrap_or(Decimal::ZERO);
    let due = Decimal::from_str(amount_due).unwrap_or(Decimal::ZERO);
    PaymentStatus::for_amounts(paid, due).as_str().to_string()
}

/// Stock after applying `delta`, or an error when it would go negative
#[wasm_bindgen]
pub fn stock_after(current: i32, delta: i32) -> Result<i32, JsValue> {
    next_stock(current, delta).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// `[week, iso_year]` for a calendar date
#[wasm_bindgen]
pub fn iso_week(year: i32, month: u32, day: u32) -> Result<Vec<i32>, JsValue> {
    iso_week_parts(year, month, day).ok_or_else(|| JsValue::from_str("Invalid date"))
}

#[wasm_bindgen]
pub fn is_valid_phone(phone: &str) -> bool {
    validate_phone(phone).is_ok()
}
