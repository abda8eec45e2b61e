//! Return transactions
//!
//! Stock comes back into the ledger as soon as a return is filed. Approval
//! and completion only move the return through its workflow.

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
    validate_non_negative_amount, validate_quantity, ActivityAction, MovementReason, Product,
    ResourceType, ReturnStatus, SaleReturn,
};
use crate::store::{found, Transactor, UnitOfWork};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReturnInput {
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub reason: Option<String>,
    #[serde(default)]
    pub refund_amount: Decimal,
    pub refund_method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnTransitionInput {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnDetails {
    #[serde(rename = "return")]
    pub record: SaleReturn,
    pub product: Product,
}

/// File a return against a sale and put the goods back into stock
pub async fn file_return(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    input: &CreateReturnInput,
) -> AppResult<ReturnDetails> {
    validate_quantity(input.quantity).map_err(|m| AppError::validation("quantity", m))?;
    validate_non_negative_amount(input.refund_amount)
        .map_err(|m| AppError::validation("refund_amount", m))?;

    let sale = found(uow.lock_sale(input.sale_id).await?, "Sale")?;
    if sale.product_id != input.product_id {
        return Err(AppError::validation(
            "product_id",
            "Product does not match the sale",
        ));
    }

    let already_returned = uow.returned_quantity(sale.id).await?;
    let returnable = sale.quantity - already_returned;
    if input.quantity > returnable {
        return Err(AppError::validation(
            "quantity",
            format!(
                "Only {} of {} units sold can still be returned",
                returnable.max(0),
                sale.quantity
            ),
        ));
    }

    let now = Utc::now();
    let record = SaleReturn {
        id: Uuid::new_v4(),
        return_number: document_number("RET"),
        sale_id: sale.id,
        product_id: input.product_id,
        quantity: input.quantity,
        reason: input.reason.clone(),
        refund_amount: input.refund_amount,
        refund_method: input.refund_method.clone(),
        status: ReturnStatus::Pending,
        returned_by: actor,
        notes: input.notes.clone(),
        return_date: now,
        updated_at: now,
    };
    uow.insert_return(&record).await?;

    let posting = apply_movement(
        uow,
        MovementRequest::stock_in(
            input.product_id,
            input.quantity,
            MovementReason::Return,
            Some(record.id),
            actor,
        ),
    )
    .await?;

    Ok(ReturnDetails {
        record,
        product: posting.product,
    })
}

/// Move a return one step forward in its workflow. Stock is not touched.
pub async fn transition_return(
    uow: &mut dyn UnitOfWork,
    return_id: Uuid,
    next: ReturnStatus,
    notes: Option<String>,
) -> AppResult<SaleReturn> {
    let mut record = found(uow.lock_return(return_id).await?, "Return")?;

    if !record.status.can_transition_to(next) {
        return Err(AppError::InvalidStateTransition(format!(
            "Cannot move a {} return to {}",
            record.status, next
        )));
    }

    record.status = next;
    if notes.is_some() {
        record.notes = notes;
    }
    record.updated_at = Utc::now();
    uow.update_return(&record).await?;
    Ok(record)
}

#[derive(Clone)]
pub struct ReturnsService {
    transactor: Transactor,
    activity: Arc<dyn ActivitySink>,
}

impl ReturnsService {
    pub fn new(transactor: Transactor, activity: Arc<dyn ActivitySink>) -> Self {
        Self {
            transactor,
            activity,
        }
    }

    pub async fn create_return(
        &self,
        actor: Uuid,
        input: CreateReturnInput,
    ) -> AppResult<ReturnDetails> {
        let details = self
            .transactor
            .run("create_return", move |uow| {
                let input = input.clone();
                Box::pin(async move { file_return(uow, actor, &input).await })
            })
            .await?;

        tracing::info!(
            return_id = %details.record.id,
            sale_id = %details.record.sale_id,
            quantity = details.record.quantity,
            "Return filed"
        );
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Create,
                ResourceType::Return,
                format!(
                    "Returned {} x {} ({})",
                    details.record.quantity, details.product.item_name, details.record.return_number
                ),
            )
            .resource(details.record.id),
        );

        Ok(details)
    }

    pub async fn approve(
        &self,
        actor: Uuid,
        return_id: Uuid,
        input: ReturnTransitionInput,
    ) -> AppResult<SaleReturn> {
        self.transition(actor, return_id, ReturnStatus::Approved, input)
            .await
    }

    pub async fn complete(
        &self,
        actor: Uuid,
        return_id: Uuid,
        input: ReturnTransitionInput,
    ) -> AppResult<SaleReturn> {
        self.transition(actor, return_id, ReturnStatus::Completed, input)
            .await
    }

    async fn transition(
        &self,
        actor: Uuid,
        return_id: Uuid,
        next: ReturnStatus,
        input: ReturnTransitionInput,
    ) -> AppResult<SaleReturn> {
        let record = self
            .transactor
            .run("transition_return", move |uow| {
                let notes = input.notes.clone();
                Box::pin(async move { transition_return(uow, return_id, next, notes).await })
            })
            .await?;

        tracing::info!(return_id = %record.id, status = %record.status, "Return status changed");
        let action = match next {
            ReturnStatus::Completed => ActivityAction::Complete,
            _ => ActivityAction::Approve,
        };
        self.activity.record(
            ActivityEntry::new(
                actor,
                action,
                ResourceType::Return,
                format!("Return {} is now {}", record.return_number, record.status),
            )
            .resource(record.id),
        );

        Ok(record)
    }
}
