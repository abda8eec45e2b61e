//! Credit customer ("lender") models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account status of a credit customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "lender_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LenderStatus {
    #[default]
    Active,
    Suspended,
}

/// A customer buying on credit, with running balances
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Lender {
    pub id: Uuid,
    pub customer_code: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit: Decimal,
    pub current_debt: Decimal,
    pub total_paid: Decimal,
    pub total_purchased: Decimal,
    pub status: LenderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lender {
    /// Book a credit sale: `amount_due` is owed out of `total_amount` bought
    pub fn charge(&mut self, amount_due: Decimal, total_amount: Decimal) -> Result<(), &'static str> {
        let current_debt = self
            .current_debt
            .checked_add(amount_due)
            .ok_or("Customer debt out of range")?;
        let total_purchased = self
            .total_purchased
            .checked_add(total_amount)
            .ok_or("Customer purchases out of range")?;
        self.current_debt = current_debt;
        self.total_purchased = total_purchased;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Book a payment. Debt never drops below zero; the amount actually
    /// taken off the debt is returned.
    pub fn receive_payment(&mut self, amount: Decimal) -> Result<Decimal, &'static str> {
        let total_paid = self
            .total_paid
            .checked_add(amount)
            .ok_or("Customer payments out of range")?;
        let reduction = amount.min(self.current_debt).max(Decimal::ZERO);
        self.current_debt -= reduction;
        self.total_paid = total_paid;
        self.updated_at = Utc::now();
        Ok(reduction)
    }
}

/// A payment received from a credit customer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: Uuid,
    pub payment_number: String,
    pub lender_id: Uuid,
    pub amount: Decimal,
    pub payment_method: Option<String>,
    /// Sale number when the payment settles a specific sale
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub received_by: Uuid,
    pub payment_date: DateTime<Utc>,
}

/// Next sequential customer code after `last` (e.g. `CUST-00012` -> `CUST-00013`)
pub fn next_customer_code(last: Option<&str>) -> String {
    let last_number = last
        .and_then(|code| code.strip_prefix("CUST-"))
        .and_then(|n| n.parse::<u32>().ok())
        .unwrap_or(0);
    format!("CUST-{:05}", last_number + 1)
}
