//! In-memory store used by the service tests
//!
//! Units of work are serialized behind an async mutex. Each one works on a
//! private copy of the state that replaces the shared state on commit, so an
//! aborted unit of work leaves nothing behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, UnitOfWork};
use crate::error::AppResult;
use crate::models::{
    AdditionalStock, Lender, Payment, Product, Sale, SaleReturn, StockLevel, StockMovement,
    WeeklyStockReport,
};

/// Every table, keyed by id. Movements and payments keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub products: HashMap<Uuid, Product>,
    pub movements: Vec<StockMovement>,
    pub sales: HashMap<Uuid, Sale>,
    pub returns: HashMap<Uuid, SaleReturn>,
    pub lenders: HashMap<Uuid, Lender>,
    pub payments: Vec<Payment>,
    pub additional_stock: HashMap<Uuid, AdditionalStock>,
    pub reports: HashMap<Uuid, WeeklyStockReport>,
}

impl MemoryState {
    pub fn movements_for(&self, product_id: Uuid) -> Vec<&StockMovement> {
        self.movements
            .iter()
            .filter(|m| m.product_id == product_id)
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    pending_conflicts: Arc<AtomicU32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn seed_lender(&self, lender: Lender) {
        self.state.lock().await.lenders.insert(lender.id, lender);
    }

    /// Copy of the committed state
    pub async fn state(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Make the next `count` stock compare-and-swaps fail as if another
    /// transaction had won the race
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            working,
            store: self.clone(),
        }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    store: MemoryStore,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn set_product_stock(
        &mut self,
        id: Uuid,
        expected: i32,
        new_stock: i32,
    ) -> AppResult<bool> {
        if self.store.take_conflict() {
            return Ok(false);
        }
        match self.working.products.get_mut(&id) {
            Some(product) if product.current_stock == expected => {
                product.current_stock = new_stock;
                product.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        if let Some(existing) = self.working.products.get_mut(&product.id) {
            let current_stock = existing.current_stock;
            let opening_stock = existing.opening_stock;
            *existing = product.clone();
            existing.current_stock = current_stock;
            existing.opening_stock = opening_stock;
        }
        Ok(())
    }

    async fn delete_product(&mut self, id: Uuid) -> AppResult<()> {
        self.working.products.remove(&id);
        Ok(())
    }

    async fn stock_levels(&mut self) -> AppResult<Vec<StockLevel>> {
        Ok(self
            .working
            .products
            .values()
            .map(StockLevel::from)
            .collect())
    }

    async fn list_products(&mut self) -> AppResult<Vec<Product>> {
        let mut products: Vec<Product> = self.working.products.values().cloned().collect();
        products.sort_by(|a, b| a.item_name.cmp(&b.item_name));
        Ok(products)
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> AppResult<()> {
        self.working.movements.push(movement.clone());
        Ok(())
    }

    async fn product_movements(&mut self, product_id: Uuid) -> AppResult<Vec<StockMovement>> {
        Ok(self
            .working
            .movements_for(product_id)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()> {
        self.working.sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        Ok(self.working.sales.get(&id).cloned())
    }

    async fn update_sale_payment(&mut self, sale: &Sale) -> AppResult<()> {
        self.working.sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn returned_quantity(&mut self, sale_id: Uuid) -> AppResult<i32> {
        Ok(self
            .working
            .returns
            .values()
            .filter(|r| r.sale_id == sale_id)
            .map(|r| r.quantity)
            .sum())
    }

    async fn insert_return(&mut self, record: &SaleReturn) -> AppResult<()> {
        self.working.returns.insert(record.id, record.clone());
        Ok(())
    }

    async fn lock_return(&mut self, id: Uuid) -> AppResult<Option<SaleReturn>> {
        Ok(self.working.returns.get(&id).cloned())
    }

    async fn update_return(&mut self, record: &SaleReturn) -> AppResult<()> {
        self.working.returns.insert(record.id, record.clone());
        Ok(())
    }

    async fn insert_lender(&mut self, lender: &Lender) -> AppResult<()> {
        self.working.lenders.insert(lender.id, lender.clone());
        Ok(())
    }

    async fn lock_lender(&mut self, id: Uuid) -> AppResult<Option<Lender>> {
        Ok(self.working.lenders.get(&id).cloned())
    }

    async fn update_lender(&mut self, lender: &Lender) -> AppResult<()> {
        self.working.lenders.insert(lender.id, lender.clone());
        Ok(())
    }

    async fn last_customer_code(&mut self) -> AppResult<Option<String>> {
        Ok(self
            .working
            .lenders
            .values()
            .map(|l| l.customer_code.clone())
            .max())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()> {
        self.working.payments.push(payment.clone());
        Ok(())
    }

    async fn insert_additional_stock(&mut self, record: &AdditionalStock) -> AppResult<()> {
        self.working
            .additional_stock
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn lock_additional_stock(&mut self, id: Uuid) -> AppResult<Option<AdditionalStock>> {
        Ok(self.working.additional_stock.get(&id).cloned())
    }

    async fn update_additional_stock(&mut self, record: &AdditionalStock) -> AppResult<()> {
        self.working
            .additional_stock
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn delete_additional_stock(&mut self, id: Uuid) -> AppResult<()> {
        self.working.additional_stock.remove(&id);
        Ok(())
    }

    async fn insert_report(&mut self, report: &WeeklyStockReport) -> AppResult<()> {
        self.working.reports.insert(report.id, report.clone());
        Ok(())
    }

    async fn lock_report(&mut self, id: Uuid) -> AppResult<Option<WeeklyStockReport>> {
        Ok(self.working.reports.get(&id).cloned())
    }

    async fn find_report_by_week(
        &mut self,
        week_number: i32,
        year: i32,
    ) -> AppResult<Option<WeeklyStockReport>> {
        Ok(self
            .working
            .reports
            .values()
            .find(|r| r.week_number == week_number && r.year == year)
            .cloned())
    }

    async fn update_report(&mut self, report: &WeeklyStockReport) -> AppResult<()> {
        self.working.reports.insert(report.id, report.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
