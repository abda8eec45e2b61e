//! Additional stock (purchase batch) transactions
//!
//! Receiving a batch credits the ledger. Editing or deleting a batch never
//! rewrites history: the difference is posted as a compensating ADJUSTMENT
//! movement that references the batch.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::{ActivityEntry, ActivitySink};
use super::document_number;
use super::ledger::{apply_movement, LedgerPosting, MovementRequest};
use crate::error::{AppError, AppResult};
use crate::models::{
    iso_week_of, validate_price, validate_quantity, ActivityAction, AdditionalStock,
    MovementReason, Product, ResourceType, StockMovement,
};
use crate::store::{found, Transactor, UnitOfWork};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAdditionalStockInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub cost_per_unit: Decimal,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    /// Defaults to today
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAdditionalStockInput {
    pub quantity: Option<i32>,
    pub cost_per_unit: Option<Decimal>,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdditionalStockDetails {
    pub record: AdditionalStock,
    pub product: Product,
    /// Compensating movement posted by an update that changed the quantity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<StockMovement>,
}

/// Record a purchase batch and add its units to stock
pub async fn receive_stock(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    input: &CreateAdditionalStockInput,
) -> AppResult<AdditionalStockDetails> {
    validate_quantity(input.quantity).map_err(|m| AppError::validation("quantity", m))?;
    validate_price(input.cost_per_unit).map_err(|m| AppError::validation("cost_per_unit", m))?;

    let purchase_date = input
        .purchase_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let total_cost = AdditionalStock::cost_of(input.quantity, input.cost_per_unit)
        .map_err(|m| AppError::validation("cost_per_unit", m))?;
    let (week_number, year) = iso_week_of(purchase_date);
    let now = Utc::now();

    let record = AdditionalStock {
        id: Uuid::new_v4(),
        batch_number: document_number("BATCH"),
        product_id: input.product_id,
        quantity: input.quantity,
        cost_per_unit: input.cost_per_unit,
        total_cost,
        supplier: input.supplier.clone(),
        invoice_number: input.invoice_number.clone(),
        purchase_date,
        week_number,
        year,
        notes: input.notes.clone(),
        created_by: actor,
        created_at: now,
        updated_at: now,
    };

    // The product must exist before the batch row can reference it
    found(uow.lock_product(input.product_id).await?, "Product")?;
    uow.insert_additional_stock(&record).await?;

    let posting = apply_movement(
        uow,
        MovementRequest::stock_in(
            input.product_id,
            input.quantity,
            MovementReason::Purchase,
            Some(record.id),
            actor,
        ),
    )
    .await?;

    Ok(AdditionalStockDetails {
        record,
        product: posting.product,
        adjustment: None,
    })
}

/// Edit a batch. A quantity change posts `new - old` as an adjustment.
pub async fn revise_stock(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    id: Uuid,
    input: &UpdateAdditionalStockInput,
) -> AppResult<AdditionalStockDetails> {
    let mut record = found(uow.lock_additional_stock(id).await?, "Additional stock")?;
    let old_quantity = record.quantity;

    if let Some(quantity) = input.quantity {
        validate_quantity(quantity).map_err(|m| AppError::validation("quantity", m))?;
        record.quantity = quantity;
    }
    if let Some(cost) = input.cost_per_unit {
        validate_price(cost).map_err(|m| AppError::validation("cost_per_unit", m))?;
        record.cost_per_unit = cost;
    }
    if let Some(date) = input.purchase_date {
        record.purchase_date = date;
    }
    if input.supplier.is_some() {
        record.supplier = input.supplier.clone();
    }
    if input.invoice_number.is_some() {
        record.invoice_number = input.invoice_number.clone();
    }
    if input.notes.is_some() {
        record.notes = input.notes.clone();
    }
    record
        .refresh_derived()
        .map_err(|m| AppError::validation("cost_per_unit", m))?;
    record.updated_at = Utc::now();

    let delta = record.quantity - old_quantity;
    let (product, adjustment) = if delta != 0 {
        let posting = apply_movement(
            uow,
            MovementRequest {
                product_id: record.product_id,
                delta,
                reason: MovementReason::Adjustment,
                reference: Some(record.id),
                notes: Some(format!(
                    "Batch {} quantity changed from {} to {}",
                    record.batch_number, old_quantity, record.quantity
                )),
                actor,
            },
        )
        .await?;
        (posting.product, Some(posting.movement))
    } else {
        let product = found(uow.lock_product(record.product_id).await?, "Product")?;
        (product, None)
    };

    uow.update_additional_stock(&record).await?;

    Ok(AdditionalStockDetails {
        record,
        product,
        adjustment,
    })
}

/// Delete a batch, taking its units back out of stock first
pub async fn remove_stock(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    id: Uuid,
) -> AppResult<LedgerPosting> {
    let record = found(uow.lock_additional_stock(id).await?, "Additional stock")?;

    let posting = apply_movement(
        uow,
        MovementRequest::stock_out(
            record.product_id,
            record.quantity,
            MovementReason::Adjustment,
            Some(record.id),
            actor,
        )
        .with_notes(Some(format!("Batch {} deleted", record.batch_number))),
    )
    .await?;

    uow.delete_additional_stock(record.id).await?;
    Ok(posting)
}

#[derive(Clone)]
pub struct AdditionalStockService {
    transactor: Transactor,
    activity: Arc<dyn ActivitySink>,
}

impl AdditionalStockService {
    pub fn new(transactor: Transactor, activity: Arc<dyn ActivitySink>) -> Self {
        Self {
            transactor,
            activity,
        }
    }

    pub async fn create(
        &self,
        actor: Uuid,
        input: CreateAdditionalStockInput,
    ) -> AppResult<AdditionalStockDetails> {
        let details = self
            .transactor
            .run("create_additional_stock", move |uow| {
                let input = input.clone();
                Box::pin(async move { receive_stock(uow, actor, &input).await })
            })
            .await?;

        tracing::info!(
            batch_id = %details.record.id,
            product_id = %details.product.id,
            quantity = details.record.quantity,
            week = details.record.week_number,
            year = details.record.year,
            "Additional stock received"
        );
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Create,
                ResourceType::AdditionalStock,
                format!(
                    "Received {} x {} ({})",
                    details.record.quantity, details.product.item_name, details.record.batch_number
                ),
            )
            .resource(details.record.id),
        );

        Ok(details)
    }

    pub async fn update(
        &self,
        actor: Uuid,
        id: Uuid,
        input: UpdateAdditionalStockInput,
    ) -> AppResult<AdditionalStockDetails> {
        let details = self
            .transactor
            .run("update_additional_stock", move |uow| {
                let input = input.clone();
                Box::pin(async move { revise_stock(uow, actor, id, &input).await })
            })
            .await?;

        tracing::info!(
            batch_id = %details.record.id,
            adjusted = details.adjustment.is_some(),
            "Additional stock updated"
        );
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Update,
                ResourceType::AdditionalStock,
                format!("Updated batch {}", details.record.batch_number),
            )
            .resource(details.record.id),
        );

        Ok(details)
    }

    pub async fn delete(&self, actor: Uuid, id: Uuid) -> AppResult<LedgerPosting> {
        let posting = self
            .transactor
            .run("delete_additional_stock", move |uow| {
                Box::pin(async move { remove_stock(uow, actor, id).await })
            })
            .await?;

        tracing::info!(batch_id = %id, product_id = %posting.product.id, "Additional stock deleted");
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Delete,
                ResourceType::AdditionalStock,
                format!(
                    "Deleted batch of {} x {}",
                    posting.movement.magnitude(),
                    posting.product.item_name
                ),
            )
            .resource(id),
        );

        Ok(posting)
    }
}
