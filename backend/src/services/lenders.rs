//! Credit customer ("lender") writes and direct debt payments

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::activity::{ActivityEntry, ActivitySink};
use super::document_number;
use crate::error::{AppError, AppResult};
use crate::models::{
    next_customer_code, validate_non_negative_amount, validate_phone, ActivityAction, Lender,
    LenderStatus, Payment, ResourceType,
};
use crate::store::{found, Transactor, UnitOfWork};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLenderInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub credit_limit: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateLenderInput {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLenderStatusInput {
    pub status: LenderStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentInput {
    pub amount: Decimal,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LenderPayment {
    pub lender: Lender,
    pub payment: Payment,
}

fn check_phone(phone: &Option<String>) -> AppResult<()> {
    if let Some(phone) = phone {
        validate_phone(phone).map_err(|m| AppError::validation("phone", m))?;
    }
    Ok(())
}

pub async fn create_lender(uow: &mut dyn UnitOfWork, input: &CreateLenderInput) -> AppResult<Lender> {
    input.validate()?;
    check_phone(&input.phone)?;
    validate_non_negative_amount(input.credit_limit)
        .map_err(|m| AppError::validation("credit_limit", m))?;

    let last_code = uow.last_customer_code().await?;
    let now = Utc::now();
    let lender = Lender {
        id: Uuid::new_v4(),
        customer_code: next_customer_code(last_code.as_deref()),
        name: input.name.trim().to_string(),
        phone: input.phone.clone(),
        email: input.email.clone(),
        address: input.address.clone(),
        credit_limit: input.credit_limit,
        current_debt: Decimal::ZERO,
        total_paid: Decimal::ZERO,
        total_purchased: Decimal::ZERO,
        status: LenderStatus::Active,
        notes: input.notes.clone(),
        created_at: now,
        updated_at: now,
    };
    uow.insert_lender(&lender).await?;
    Ok(lender)
}

pub async fn update_lender(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
    input: &UpdateLenderInput,
) -> AppResult<Lender> {
    input.validate()?;
    check_phone(&input.phone)?;
    let mut lender = found(uow.lock_lender(id).await?, "Lender")?;

    if let Some(name) = &input.name {
        lender.name = name.trim().to_string();
    }
    if input.phone.is_some() {
        lender.phone = input.phone.clone();
    }
    if input.email.is_some() {
        lender.email = input.email.clone();
    }
    if input.address.is_some() {
        lender.address = input.address.clone();
    }
    if let Some(limit) = input.credit_limit {
        validate_non_negative_amount(limit)
            .map_err(|m| AppError::validation("credit_limit", m))?;
        lender.credit_limit = limit;
    }
    if input.notes.is_some() {
        lender.notes = input.notes.clone();
    }
    lender.updated_at = Utc::now();
    uow.update_lender(&lender).await?;
    Ok(lender)
}

pub async fn set_lender_status(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
    status: LenderStatus,
) -> AppResult<Lender> {
    let mut lender = found(uow.lock_lender(id).await?, "Lender")?;
    lender.status = status;
    lender.updated_at = Utc::now();
    uow.update_lender(&lender).await?;
    Ok(lender)
}

/// Take a payment against a customer's outstanding debt. Paying more than is
/// owed is refused.
pub async fn record_lender_payment(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    id: Uuid,
    input: &RecordPaymentInput,
) -> AppResult<LenderPayment> {
    if input.amount <= Decimal::ZERO {
        return Err(AppError::validation(
            "amount",
            "Payment amount must be greater than 0",
        ));
    }

    let mut lender = found(uow.lock_lender(id).await?, "Lender")?;
    if input.amount > lender.current_debt {
        return Err(AppError::validation(
            "amount",
            format!(
                "Payment of {} exceeds outstanding debt of {}",
                input.amount, lender.current_debt
            ),
        ));
    }

    lender
        .receive_payment(input.amount)
        .map_err(|m| AppError::validation("amount", m))?;
    uow.update_lender(&lender).await?;

    let payment = Payment {
        id: Uuid::new_v4(),
        payment_number: document_number("PAY"),
        lender_id: lender.id,
        amount: input.amount,
        payment_method: input.payment_method.clone(),
        reference: input.reference.clone(),
        notes: input.notes.clone(),
        received_by: actor,
        payment_date: lender.updated_at,
    };
    uow.insert_payment(&payment).await?;

    Ok(LenderPayment { lender, payment })
}

#[derive(Clone)]
pub struct LenderService {
    transactor: Transactor,
    activity: Arc<dyn ActivitySink>,
}

impl LenderService {
    pub fn new(transactor: Transactor, activity: Arc<dyn ActivitySink>) -> Self {
        Self {
            transactor,
            activity,
        }
    }

    pub async fn create(&self, actor: Uuid, input: CreateLenderInput) -> AppResult<Lender> {
        let lender = self
            .transactor
            .run("create_lender", move |uow| {
                let input = input.clone();
                Box::pin(async move { create_lender(uow, &input).await })
            })
            .await?;

        tracing::info!(lender_id = %lender.id, code = %lender.customer_code, "Lender created");
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Create,
                ResourceType::Lender,
                format!("Created customer {} ({})", lender.name, lender.customer_code),
            )
            .resource(lender.id),
        );
        Ok(lender)
    }

    pub async fn update(&self, actor: Uuid, id: Uuid, input: UpdateLenderInput) -> AppResult<Lender> {
        let lender = self
            .transactor
            .run("update_lender", move |uow| {
                let input = input.clone();
                Box::pin(async move { update_lender(uow, id, &input).await })
            })
            .await?;

        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Update,
                ResourceType::Lender,
                format!("Updated customer {}", lender.customer_code),
            )
            .resource(lender.id),
        );
        Ok(lender)
    }

    pub async fn update_status(
        &self,
        actor: Uuid,
        id: Uuid,
        status: LenderStatus,
    ) -> AppResult<Lender> {
        let lender = self
            .transactor
            .run("update_lender_status", move |uow| {
                Box::pin(async move { set_lender_status(uow, id, status).await })
            })
            .await?;

        tracing::info!(lender_id = %lender.id, status = ?lender.status, "Lender status changed");
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Update,
                ResourceType::Lender,
                format!("Customer {} set to {:?}", lender.customer_code, lender.status),
            )
            .resource(lender.id),
        );
        Ok(lender)
    }

    pub async fn record_payment(
        &self,
        actor: Uuid,
        id: Uuid,
        input: RecordPaymentInput,
    ) -> AppResult<LenderPayment> {
        let result = self
            .transactor
            .run("record_lender_payment", move |uow| {
                let input = input.clone();
                Box::pin(async move { record_lender_payment(uow, actor, id, &input).await })
            })
            .await?;

        tracing::info!(
            lender_id = %result.lender.id,
            amount = %result.payment.amount,
            remaining_debt = %result.lender.current_debt,
            "Lender payment recorded"
        );
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Payment,
                ResourceType::Payment,
                format!(
                    "Payment {} of {} from {}",
                    result.payment.payment_number, result.payment.amount, result.lender.name
                ),
            )
            .resource(result.payment.id),
        );
        Ok(result)
    }
}
