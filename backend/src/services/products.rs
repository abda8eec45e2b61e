//! Product catalogue writes
//!
//! Descriptive fields and prices are edited directly. Stock is not: the
//! initial quantity is fixed at creation and every later change goes
//! through the ledger.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::activity::{ActivityEntry, ActivitySink};
use super::ledger::{apply_movement, LedgerPosting, MovementRequest};
use crate::error::{AppError, AppResult};
use crate::models::{
    validate_non_negative_amount, validate_stock_level, ActivityAction, MovementReason, Product,
    ResourceType,
};
use crate::store::{found, Transactor, UnitOfWork};
use shared::ledger::{audit, LedgerAudit};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub item_name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub barcode: Option<String>,
    pub units: Option<String>,
    pub location_name: Option<String>,
    /// Stock on hand when the product is added
    #[serde(default)]
    pub initial_stock: i32,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    pub reorder_level: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200, message = "Item name cannot be empty"))]
    pub item_name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub barcode: Option<String>,
    pub units: Option<String>,
    pub location_name: Option<String>,
    pub cost_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub reorder_level: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStockInput {
    /// Signed change; negative removes stock
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductChange {
    pub before: Product,
    pub after: Product,
}

fn check_prices(cost_price: Decimal, selling_price: Decimal) -> AppResult<()> {
    validate_non_negative_amount(cost_price).map_err(|m| AppError::validation("cost_price", m))?;
    validate_non_negative_amount(selling_price)
        .map_err(|m| AppError::validation("selling_price", m))?;
    Ok(())
}

pub async fn create_product(
    uow: &mut dyn UnitOfWork,
    input: &CreateProductInput,
) -> AppResult<Product> {
    input.validate()?;
    validate_stock_level(input.initial_stock)
        .map_err(|m| AppError::validation("initial_stock", m))?;
    validate_stock_level(input.reorder_level)
        .map_err(|m| AppError::validation("reorder_level", m))?;
    check_prices(input.cost_price, input.selling_price)?;

    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4(),
        item_name: input.item_name.trim().to_string(),
        description: input.description.clone(),
        category: input.category.clone(),
        barcode: input.barcode.clone(),
        units: input.units.clone(),
        location_name: input.location_name.clone(),
        opening_stock: input.initial_stock,
        current_stock: input.initial_stock,
        cost_price: input.cost_price,
        selling_price: input.selling_price,
        reorder_level: input.reorder_level,
        created_at: now,
        updated_at: now,
    };
    uow.insert_product(&product).await?;
    Ok(product)
}

pub async fn update_product(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
    input: &UpdateProductInput,
) -> AppResult<ProductChange> {
    input.validate()?;
    let before = found(uow.lock_product(id).await?, "Product")?;
    let mut product = before.clone();

    if let Some(name) = &input.item_name {
        product.item_name = name.trim().to_string();
    }
    if input.description.is_some() {
        product.description = input.description.clone();
    }
    if input.category.is_some() {
        product.category = input.category.clone();
    }
    if input.barcode.is_some() {
        product.barcode = input.barcode.clone();
    }
    if input.units.is_some() {
        product.units = input.units.clone();
    }
    if input.location_name.is_some() {
        product.location_name = input.location_name.clone();
    }
    if let Some(price) = input.cost_price {
        product.cost_price = price;
    }
    if let Some(price) = input.selling_price {
        product.selling_price = price;
    }
    if let Some(level) = input.reorder_level {
        validate_stock_level(level).map_err(|m| AppError::validation("reorder_level", m))?;
        product.reorder_level = level;
    }
    check_prices(product.cost_price, product.selling_price)?;

    product.updated_at = Utc::now();
    uow.update_product(&product).await?;
    Ok(ProductChange {
        before,
        after: product,
    })
}

/// Manual stock correction, posted as an ADJUSTMENT movement
pub async fn adjust_stock(
    uow: &mut dyn UnitOfWork,
    actor: Uuid,
    id: Uuid,
    input: &AdjustStockInput,
) -> AppResult<LedgerPosting> {
    apply_movement(
        uow,
        MovementRequest {
            product_id: id,
            delta: input.quantity,
            reason: MovementReason::Adjustment,
            reference: None,
            notes: input.notes.clone(),
            actor,
        },
    )
    .await
}

/// Delete a product that has never moved. Products with ledger history are
/// kept so the history stays intact.
pub async fn delete_product(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<Product> {
    let product = found(uow.lock_product(id).await?, "Product")?;
    if !uow.product_movements(id).await?.is_empty() {
        return Err(AppError::conflict(
            "product",
            "Product has stock movements and cannot be deleted",
        ));
    }
    uow.delete_product(id).await?;
    Ok(product)
}

/// Replay a product's movements and compare the result with its stock
pub async fn verify_ledger(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<LedgerAudit> {
    let product = found(uow.lock_product(id).await?, "Product")?;
    let movements = uow.product_movements(id).await?;
    Ok(audit(
        product.id,
        product.opening_stock,
        product.current_stock,
        &movements,
    ))
}

#[derive(Clone)]
pub struct ProductService {
    transactor: Transactor,
    activity: Arc<dyn ActivitySink>,
}

impl ProductService {
    pub fn new(transactor: Transactor, activity: Arc<dyn ActivitySink>) -> Self {
        Self {
            transactor,
            activity,
        }
    }

    pub async fn create(&self, actor: Uuid, input: CreateProductInput) -> AppResult<Product> {
        let product = self
            .transactor
            .run("create_product", move |uow| {
                let input = input.clone();
                Box::pin(async move { create_product(uow, &input).await })
            })
            .await?;

        tracing::info!(product_id = %product.id, stock = product.current_stock, "Product created");
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Create,
                ResourceType::Product,
                format!("Created product {}", product.item_name),
            )
            .resource(product.id),
        );
        Ok(product)
    }

    pub async fn update(
        &self,
        actor: Uuid,
        id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        let change = self
            .transactor
            .run("update_product", move |uow| {
                let input = input.clone();
                Box::pin(async move { update_product(uow, id, &input).await })
            })
            .await?;

        tracing::info!(product_id = %id, "Product updated");
        let mut entry = ActivityEntry::new(
            actor,
            ActivityAction::Update,
            ResourceType::Product,
            format!("Updated product {}", change.after.item_name),
        )
        .resource(id);
        if let (Ok(before), Ok(after)) = (
            serde_json::to_value(&change.before),
            serde_json::to_value(&change.after),
        ) {
            entry = entry.changes(before, after);
        }
        self.activity.record(entry);

        Ok(change.after)
    }

    pub async fn adjust_stock(
        &self,
        actor: Uuid,
        id: Uuid,
        input: AdjustStockInput,
    ) -> AppResult<LedgerPosting> {
        let posting = self
            .transactor
            .run("adjust_stock", move |uow| {
                let input = input.clone();
                Box::pin(async move { adjust_stock(uow, actor, id, &input).await })
            })
            .await?;

        tracing::info!(
            product_id = %id,
            delta = posting.movement.quantity,
            stock = posting.product.current_stock,
            "Stock adjusted"
        );
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Adjust,
                ResourceType::Product,
                format!(
                    "Adjusted {} by {} to {}",
                    posting.product.item_name,
                    posting.movement.quantity,
                    posting.product.current_stock
                ),
            )
            .resource(id),
        );
        Ok(posting)
    }

    pub async fn delete(&self, actor: Uuid, id: Uuid) -> AppResult<()> {
        let product = self
            .transactor
            .run("delete_product", move |uow| {
                Box::pin(async move { delete_product(uow, id).await })
            })
            .await?;

        tracing::info!(product_id = %id, "Product deleted");
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Delete,
                ResourceType::Product,
                format!("Deleted product {}", product.item_name),
            )
            .resource(id),
        );
        Ok(())
    }

    pub async fn verify_ledger(&self, id: Uuid) -> AppResult<LedgerAudit> {
        let report = self
            .transactor
            .run("verify_ledger", move |uow| {
                Box::pin(async move { verify_ledger(uow, id).await })
            })
            .await?;

        if !report.is_consistent() {
            tracing::warn!(
                product_id = %id,
                current_stock = report.current_stock,
                replayed_stock = report.replayed_stock,
                discrepancies = report.discrepancies.len(),
                "Ledger does not match product stock"
            );
        }
        Ok(report)
    }
}
