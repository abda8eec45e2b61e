//! Sale transactions
//!
//! A sale debits the ledger and, for credit customers, raises their debt in
//! the same unit of work. Payments against a sale settle the amount due and
//! the customer's debt together.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::{ActivityEntry, ActivitySink};
use super::document_number;
use super::ledger::{apply_movement, MovementRequest};
use crate::error::{AppError, AppResult};
use crate::models::{
    ActivityAction, Lender, MovementReason, Payment, PaymentApplication, PaymentStatus, Product,
    ResourceType, Sale, SaleTotals,
};
use crate::store::{found, Transactor, UnitOfWork};

/// Input for a single-product sale
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSaleInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    /// Checked against the amounts; derived when omitted
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub amount_paid: Decimal,
    pub notes: Option<String>,
}

/// One line of a bulk sale
#[derive(Debug, Clone, Deserialize)]
pub struct SaleLineInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    pub payment_status: Option<PaymentStatus>,
    pub notes: Option<String>,
}

/// Several products sold to one customer in one order
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSaleInput {
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<SaleLineInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePaymentInput {
    /// Increment paid now, not the new running total
    pub amount_paid: Decimal,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleDetails {
    pub sale: Sale,
    pub product: Product,
    pub lender: Option<Lender>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSaleResult {
    pub order_number: String,
    pub sales: Vec<SaleDetails>,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    pub sale: Sale,
    /// Part of the payment taken off the amount due
    pub applied: Decimal,
    /// Part of the payment beyond the amount due, to be handed back
    pub overpayment: Decimal,
    pub payment: Option<Payment>,
    pub lender: Option<Lender>,
}

/// Record a sale: insert it, take the stock out of the ledger, and charge a
/// credit customer with whatever is left unpaid
pub async fn record_sale(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    input: &CreateSaleInput,
) -> AppResult<SaleDetails> {
    record_sale_line(uow, actor, input, document_number("SALE"), None).await
}

async fn record_sale_line(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    input: &CreateSaleInput,
    sale_number: String,
    order_number: Option<String>,
) -> AppResult<SaleDetails> {
    let totals = SaleTotals::compute(input.quantity, input.unit_price, input.amount_paid)
        .map_err(|m| AppError::validation("unit_price", m))?;
    totals
        .check_status(input.payment_status)
        .map_err(|m| AppError::validation("payment_status", m))?;

    let mut lender = match input.customer_id {
        Some(id) => Some(found(uow.lock_lender(id).await?, "Customer")?),
        None => None,
    };

    let now = Utc::now();
    let sale = Sale {
        id: Uuid::new_v4(),
        sale_number,
        order_number,
        product_id: input.product_id,
        quantity: input.quantity,
        unit_price: input.unit_price,
        total_amount: totals.total_amount,
        customer_id: input.customer_id,
        customer_name: input
            .customer_name
            .clone()
            .or_else(|| lender.as_ref().map(|l| l.name.clone())),
        payment_method: input.payment_method.clone(),
        amount_paid: totals.amount_paid,
        amount_due: totals.amount_due,
        payment_status: totals.payment_status,
        sold_by: actor,
        notes: input.notes.clone(),
        sale_date: now,
        created_at: now,
        updated_at: now,
    };
    uow.insert_sale(&sale).await?;

    let posting = apply_movement(
        uow,
        MovementRequest::stock_out(
            input.product_id,
            input.quantity,
            MovementReason::Sale,
            Some(sale.id),
            actor,
        ),
    )
    .await?;

    if let Some(lender) = lender.as_mut() {
        if totals.payment_status != PaymentStatus::Paid {
            lender
                .charge(totals.amount_due, totals.total_amount)
                .map_err(|m| AppError::validation("customer_id", m))?;
            uow.update_lender(lender).await?;
        }
    }

    Ok(SaleDetails {
        sale,
        product: posting.product,
        lender,
    })
}

/// Record every line of an order under `order_number`; the first failing line
/// fails the whole order
pub async fn record_bulk_sale(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    order_number: &str,
    input: &BulkSaleInput,
) -> AppResult<BulkSaleResult> {
    if input.items.is_empty() {
        return Err(AppError::validation(
            "items",
            "A bulk sale needs at least one item",
        ));
    }

    let mut sales = Vec::with_capacity(input.items.len());
    for (index, line) in input.items.iter().enumerate() {
        let sale_input = CreateSaleInput {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            customer_id: input.customer_id,
            customer_name: input.customer_name.clone(),
            payment_method: input.payment_method.clone(),
            payment_status: line.payment_status,
            amount_paid: line.amount_paid,
            notes: line.notes.clone().or_else(|| input.notes.clone()),
        };
        let sale_number = format!("{}-{}", order_number, index + 1);
        let details = record_sale_line(
            uow,
            actor,
            &sale_input,
            sale_number,
            Some(order_number.to_string()),
        )
        .await?;
        sales.push(details);
    }

    let total_amount = sales
        .iter()
        .try_fold(Decimal::ZERO, |total, d| total.checked_add(d.sale.total_amount))
        .ok_or_else(|| AppError::validation("lines", "Order total out of range"))?;
    Ok(BulkSaleResult {
        order_number: order_number.to_string(),
        sales,
        total_amount,
    })
}

/// Apply a payment increment to a sale, settling a credit customer's debt by
/// the amount actually applied
pub async fn apply_sale_payment(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    sale_id: Uuid,
    input: &UpdatePaymentInput,
) -> AppResult<PaymentOutcome> {
    let mut sale = found(uow.lock_sale(sale_id).await?, "Sale")?;

    let application =
        PaymentApplication::apply(sale.total_amount, sale.amount_paid, input.amount_paid)
            .map_err(|m| AppError::validation("amount_paid", m))?;

    sale.amount_paid = application.amount_paid;
    sale.amount_due = application.amount_due;
    sale.payment_status = application.payment_status;
    if input.payment_method.is_some() {
        sale.payment_method = input.payment_method.clone();
    }
    sale.updated_at = Utc::now();
    uow.update_sale_payment(&sale).await?;

    let mut lender = None;
    let mut payment = None;
    if let Some(customer_id) = sale.customer_id {
        let mut customer = found(uow.lock_lender(customer_id).await?, "Customer")?;
        customer
            .receive_payment(application.applied)
            .map_err(|m| AppError::validation("amount_paid", m))?;
        uow.update_lender(&customer).await?;

        let record = Payment {
            id: Uuid::new_v4(),
            payment_number: document_number("PAY"),
            lender_id: customer_id,
            amount: application.applied,
            payment_method: sale.payment_method.clone(),
            reference: Some(sale.sale_number.clone()),
            notes: input.notes.clone(),
            received_by: actor,
            payment_date: sale.updated_at,
        };
        uow.insert_payment(&record).await?;

        lender = Some(customer);
        payment = Some(record);
    }

    Ok(PaymentOutcome {
        sale,
        applied: application.applied,
        overpayment: application.overpayment,
        payment,
        lender,
    })
}

/// Sale service: runs sale transactions and records their activity
#[derive(Clone)]
pub struct SalesService {
    transactor: Transactor,
    activity: Arc<dyn ActivitySink>,
}

impl SalesService {
    pub fn new(transactor: Transactor, activity: Arc<dyn ActivitySink>) -> Self {
        Self {
            transactor,
            activity,
        }
    }

    pub async fn create_sale(&self, actor: Uuid, input: CreateSaleInput) -> AppResult<SaleDetails> {
        let details = self
            .transactor
            .run("create_sale", move |uow| {
                let input = input.clone();
                Box::pin(async move { record_sale(uow, actor, &input).await })
            })
            .await?;

        tracing::info!(
            sale_id = %details.sale.id,
            sale_number = %details.sale.sale_number,
            product_id = %details.product.id,
            quantity = details.sale.quantity,
            status = %details.sale.payment_status,
            "Sale recorded"
        );
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Create,
                ResourceType::Sale,
                format!(
                    "Sold {} x {} ({})",
                    details.sale.quantity, details.product.item_name, details.sale.sale_number
                ),
            )
            .resource(details.sale.id),
        );

        Ok(details)
    }

    pub async fn create_bulk_sale(
        &self,
        actor: Uuid,
        input: BulkSaleInput,
    ) -> AppResult<BulkSaleResult> {
        let order_number = format!("ORD-{}", Utc::now().timestamp_millis());

        let result = self
            .transactor
            .run("create_bulk_sale", move |uow| {
                let input = input.clone();
                let order_number = order_number.clone();
                Box::pin(async move { record_bulk_sale(uow, actor, &order_number, &input).await })
            })
            .await?;

        tracing::info!(
            order_number = %result.order_number,
            lines = result.sales.len(),
            total = %result.total_amount,
            "Bulk sale recorded"
        );
        for details in &result.sales {
            self.activity.record(
                ActivityEntry::new(
                    actor,
                    ActivityAction::Create,
                    ResourceType::Sale,
                    format!(
                        "Sold {} x {} ({})",
                        details.sale.quantity, details.product.item_name, details.sale.sale_number
                    ),
                )
                .resource(details.sale.id),
            );
        }

        Ok(result)
    }

    pub async fn update_payment(
        &self,
        actor: Uuid,
        sale_id: Uuid,
        input: UpdatePaymentInput,
    ) -> AppResult<PaymentOutcome> {
        let outcome = self
            .transactor
            .run("update_sale_payment", move |uow| {
                let input = input.clone();
                Box::pin(async move { apply_sale_payment(uow, actor, sale_id, &input).await })
            })
            .await?;

        tracing::info!(
            sale_id = %outcome.sale.id,
            applied = %outcome.applied,
            overpayment = %outcome.overpayment,
            status = %outcome.sale.payment_status,
            "Sale payment recorded"
        );
        if outcome.overpayment > Decimal::ZERO {
            tracing::warn!(
                sale_id = %outcome.sale.id,
                overpayment = %outcome.overpayment,
                "Payment exceeded the amount due"
            );
        }
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Payment,
                ResourceType::Sale,
                format!(
                    "Payment of {} on {}",
                    outcome.applied, outcome.sale.sale_number
                ),
            )
            .resource(outcome.sale.id),
        );

        Ok(outcome)
    }
}
