//! Sale and payment arithmetic

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment state of a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl PaymentStatus {
    /// Status implied by what has been paid and what is still due
    pub fn for_amounts(amount_paid: Decimal, amount_due: Decimal) -> Self {
        if amount_due <= Decimal::ZERO {
            PaymentStatus::Paid
        } else if amount_paid > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Partial => "PARTIAL",
            PaymentStatus::Unpaid => "UNPAID",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-product sale line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: Uuid,
    pub sale_number: String,
    /// Shared by every line of a bulk sale
    pub order_number: Option<String>,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub payment_status: PaymentStatus,
    pub sold_by: Uuid,
    pub notes: Option<String>,
    pub sale_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Amounts of a new sale, checked for consistency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaleTotals {
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub payment_status: PaymentStatus,
}

impl SaleTotals {
    /// Compute totals for `quantity` units at `unit_price` with `amount_paid`
    /// handed over at the till.
    pub fn compute(
        quantity: i32,
        unit_price: Decimal,
        amount_paid: Decimal,
    ) -> Result<Self, &'static str> {
        if quantity <= 0 {
            return Err("Quantity must be greater than 0");
        }
        if unit_price <= Decimal::ZERO {
            return Err("Unit price must be greater than 0");
        }
        if amount_paid < Decimal::ZERO {
            return Err("Amount paid cannot be negative");
        }

        let total_amount = Decimal::from(quantity)
            .checked_mul(unit_price)
            .ok_or("Total amount out of range")?;
        if amount_paid > total_amount {
            return Err("Amount paid exceeds the total amount");
        }
        let amount_due = total_amount - amount_paid;

        Ok(Self {
            total_amount,
            amount_paid,
            amount_due,
            payment_status: PaymentStatus::for_amounts(amount_paid, amount_due),
        })
    }

    /// Accept a caller-supplied status only when it agrees with the amounts
    pub fn check_status(&self, requested: Option<PaymentStatus>) -> Result<(), &'static str> {
        match requested {
            Some(status) if status != self.payment_status => {
                Err("Payment status does not match the amounts paid")
            }
            _ => Ok(()),
        }
    }
}

/// Result of applying a payment increment to a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentApplication {
    /// Part of the increment that reduced the amount due
    pub applied: Decimal,
    /// Part of the increment beyond what was due; never stored on the sale
    pub overpayment: Decimal,
    pub amount_paid: Decimal,
    pub amount_due: Decimal,
    pub payment_status: PaymentStatus,
}

impl PaymentApplication {
    /// Apply `increment` to a sale with `total_amount` of which `amount_paid`
    /// is already settled. The amount due is clamped at zero and any excess is
    /// reported as overpayment.
    pub fn apply(
        total_amount: Decimal,
        amount_paid: Decimal,
        increment: Decimal,
    ) -> Result<Self, &'static str> {
        if increment <= Decimal::ZERO {
            return Err("Payment amount must be greater than 0");
        }
        let outstanding = total_amount - amount_paid;
        if outstanding <= Decimal::ZERO {
            return Err("Sale is already fully paid");
        }

        let applied = increment.min(outstanding);
        let amount_paid = amount_paid + applied;
        let amount_due = total_amount - amount_paid;
        let payment_status = if amount_due <= Decimal::ZERO {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };

        Ok(Self {
            applied,
            overpayment: increment - applied,
            amount_paid,
            amount_due,
            payment_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_totals_for_cash_sale() {
        let totals = SaleTotals::compute(3, dec!(120), dec!(360)).unwrap();
        assert_eq!(totals.total_amount, dec!(360));
        assert_eq!(totals.amount_due, dec!(0));
        assert_eq!(totals.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_totals_for_credit_sale() {
        let totals = SaleTotals::compute(2, dec!(100), dec!(50)).unwrap();
        assert_eq!(totals.amount_due, dec!(150));
        assert_eq!(totals.payment_status, PaymentStatus::Partial);

        let unpaid = SaleTotals::compute(2, dec!(100), dec!(0)).unwrap();
        assert_eq!(unpaid.payment_status, PaymentStatus::Unpaid);
    }

    #[test]
    fn test_totals_reject_bad_input() {
        assert!(SaleTotals::compute(0, dec!(10), dec!(0)).is_err());
        assert!(SaleTotals::compute(1, dec!(0), dec!(0)).is_err());
        assert!(SaleTotals::compute(1, dec!(10), dec!(-1)).is_err());
        assert!(SaleTotals::compute(1, dec!(10), dec!(11)).is_err());
        assert_eq!(
            SaleTotals::compute(2, Decimal::MAX, dec!(0)),
            Err("Total amount out of range")
        );
    }

    #[test]
    fn test_requested_status_must_agree() {
        let totals = SaleTotals::compute(2, dec!(100), dec!(50)).unwrap();
        assert!(totals.check_status(None).is_ok());
        assert!(totals.check_status(Some(PaymentStatus::Partial)).is_ok());
        assert!(totals.check_status(Some(PaymentStatus::Paid)).is_err());
    }

    #[test]
    fn test_payment_settles_sale() {
        let p = PaymentApplication::apply(dec!(200), dec!(50), dec!(150)).unwrap();
        assert_eq!(p.amount_paid, dec!(200));
        assert_eq!(p.amount_due, dec!(0));
        assert_eq!(p.payment_status, PaymentStatus::Paid);
        assert_eq!(p.overpayment, dec!(0));
    }

    #[test]
    fn test_overpayment_is_clamped() {
        let p = PaymentApplication::apply(dec!(200), dec!(50), dec!(500)).unwrap();
        assert_eq!(p.applied, dec!(150));
        assert_eq!(p.overpayment, dec!(350));
        assert_eq!(p.amount_due, dec!(0));
    }

    #[test]
    fn test_payment_rejected_when_nothing_due() {
        assert!(PaymentApplication::apply(dec!(200), dec!(200), dec!(1)).is_err());
        assert!(PaymentApplication::apply(dec!(200), dec!(0), dec!(0)).is_err());
    }

    proptest! {
        #[test]
        fn prop_payments_preserve_total(
            total_cents in 1i64..10_000_000,
            payments in prop::collection::vec(1i64..5_000_000, 1..10),
        ) {
            let total = Decimal::new(total_cents, 2);
            let mut paid = Decimal::ZERO;
            for cents in payments {
                match PaymentApplication::apply(total, paid, Decimal::new(cents, 2)) {
                    Ok(p) => {
                        prop_assert_eq!(p.amount_paid + p.amount_due, total);
                        prop_assert!(p.amount_due >= Decimal::ZERO);
                        prop_assert_eq!(
                            p.payment_status == PaymentStatus::Paid,
                            p.amount_due <= Decimal::ZERO
                        );
                        paid = p.amount_paid;
                    }
                    Err(_) => prop_assert_eq!(paid, total),
                }
            }
        }
    }
}
