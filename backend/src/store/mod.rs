//! Transactional storage for the ledger
//!
//! Business operations never talk to the database directly. They receive a
//! `&mut dyn UnitOfWork`, which is one open transaction: either all of its
//! writes are committed together or none of them are visible. The
//! [`Transactor`] opens units of work, commits them, and re-runs an operation
//! that lost a concurrent update.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    AdditionalStock, Lender, Payment, Product, Sale, SaleReturn, StockLevel, StockMovement,
    WeeklyStockReport,
};

pub mod memory;
pub mod postgres;

pub use memory::{MemoryState, MemoryStore};
pub use postgres::PgStore;

/// Source of units of work
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}

/// One open transaction
///
/// `lock_*` reads take a row lock that is held until the unit of work ends.
/// Dropping a unit of work without committing discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    // Products
    async fn lock_product(&mut self, id: Uuid) -> AppResult<Option<Product>>;
    /// Compare-and-swap the stock of a product; `false` when another
    /// transaction changed it first
    async fn set_product_stock(&mut self, id: Uuid, expected: i32, new_stock: i32)
        -> AppResult<bool>;
    async fn insert_product(&mut self, product: &Product) -> AppResult<()>;
    /// Write descriptive fields and prices; never touches stock
    async fn update_product(&mut self, product: &Product) -> AppResult<()>;
    async fn delete_product(&mut self, id: Uuid) -> AppResult<()>;
    async fn stock_levels(&mut self) -> AppResult<Vec<StockLevel>>;
    async fn list_products(&mut self) -> AppResult<Vec<Product>>;

    // Movements
    async fn insert_movement(&mut self, movement: &StockMovement) -> AppResult<()>;
    /// All movements of a product, oldest first
    async fn product_movements(&mut self, product_id: Uuid) -> AppResult<Vec<StockMovement>>;

    // Sales
    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()>;
    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>>;
    async fn update_sale_payment(&mut self, sale: &Sale) -> AppResult<()>;
    /// Units already returned against a sale
    async fn returned_quantity(&mut self, sale_id: Uuid) -> AppResult<i32>;

    // Returns
    async fn insert_return(&mut self, record: &SaleReturn) -> AppResult<()>;
    async fn lock_return(&mut self, id: Uuid) -> AppResult<Option<SaleReturn>>;
    async fn update_return(&mut self, record: &SaleReturn) -> AppResult<()>;

    // Lenders and payments
    async fn insert_lender(&mut self, lender: &Lender) -> AppResult<()>;
    async fn lock_lender(&mut self, id: Uuid) -> AppResult<Option<Lender>>;
    async fn update_lender(&mut self, lender: &Lender) -> AppResult<()>;
    async fn last_customer_code(&mut self) -> AppResult<Option<String>>;
    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()>;

    // Purchase batches
    async fn insert_additional_stock(&mut self, record: &AdditionalStock) -> AppResult<()>;
    async fn lock_additional_stock(&mut self, id: Uuid) -> AppResult<Option<AdditionalStock>>;
    async fn update_additional_stock(&mut self, record: &AdditionalStock) -> AppResult<()>;
    async fn delete_additional_stock(&mut self, id: Uuid) -> AppResult<()>;

    // Weekly reports
    async fn insert_report(&mut self, report: &WeeklyStockReport) -> AppResult<()>;
    async fn lock_report(&mut self, id: Uuid) -> AppResult<Option<WeeklyStockReport>>;
    async fn find_report_by_week(
        &mut self,
        week_number: i32,
        year: i32,
    ) -> AppResult<Option<WeeklyStockReport>>;
    async fn update_report(&mut self, report: &WeeklyStockReport) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Runs operations inside units of work, retrying lost concurrent updates
#[derive(Clone)]
pub struct Transactor {
    store: Arc<dyn Store>,
    max_retries: u32,
}

impl Transactor {
    pub fn new(store: Arc<dyn Store>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// Run `op` in a fresh unit of work and commit it.
    ///
    /// Any error rolls the unit of work back. A `Conflict` re-runs `op` from
    /// scratch up to `max_retries` more times before it is returned.
    pub async fn run<T, F>(&self, operation: &'static str, mut op: F) -> AppResult<T>
    where
        T: Send,
        F: for<'u> FnMut(&'u mut dyn UnitOfWork) -> BoxFuture<'u, AppResult<T>> + Send,
    {
        let mut attempt: u32 = 0;
        loop {
            let mut uow = self.store.begin().await?;
            let outcome = op(uow.as_mut()).await;

            let err = match outcome {
                Ok(value) => match uow.commit().await {
                    Ok(()) => return Ok(value),
                    Err(err) => err,
                },
                Err(err) => {
                    if let Err(rollback_err) = uow.rollback().await {
                        tracing::warn!(operation, "Rollback failed: {}", rollback_err);
                    }
                    err
                }
            };

            if !err.is_conflict() || attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;
            tracing::warn!(operation, attempt, "Concurrent update detected, retrying");
        }
    }
}

/// Shorthand for the "row does not exist" case of a lock
pub(crate) fn found<T>(row: Option<T>, resource: &str) -> AppResult<T> {
    row.ok_or_else(|| AppError::NotFound(resource.to_string()))
}
