//! Shared fixtures for the service tests
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shared::ledger::{audit, LedgerAudit};
use stock_ledger_backend::models::{Lender, LenderStatus, Product};
use stock_ledger_backend::services::{
    AdditionalStockService, LenderService, MemoryActivitySink, ProductService, ReturnsService,
    SalesService, StockReportService,
};
use stock_ledger_backend::store::{MemoryStore, Transactor};
use uuid::Uuid;

pub struct Harness {
    pub store: MemoryStore,
    pub activity: MemoryActivitySink,
    pub transactor: Transactor,
    pub actor: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_retries(3)
    }

    pub fn with_retries(max_retries: u32) -> Self {
        let store = MemoryStore::new();
        let transactor = Transactor::new(Arc::new(store.clone()), max_retries);
        Self {
            store,
            activity: MemoryActivitySink::new(),
            transactor,
            actor: Uuid::new_v4(),
        }
    }

    pub fn sales(&self) -> SalesService {
        SalesService::new(self.transactor.clone(), Arc::new(self.activity.clone()))
    }

    pub fn returns(&self) -> ReturnsService {
        ReturnsService::new(self.transactor.clone(), Arc::new(self.activity.clone()))
    }

    pub fn additional_stock(&self) -> AdditionalStockService {
        AdditionalStockService::new(self.transactor.clone(), Arc::new(self.activity.clone()))
    }

    pub fn products(&self) -> ProductService {
        ProductService::new(self.transactor.clone(), Arc::new(self.activity.clone()))
    }

    pub fn lenders(&self) -> LenderService {
        LenderService::new(self.transactor.clone(), Arc::new(self.activity.clone()))
    }

    pub fn reports(&self) -> StockReportService {
        StockReportService::new(self.transactor.clone(), Arc::new(self.activity.clone()))
    }

    pub async fn add_product(
        &self,
        name: &str,
        stock: i32,
        cost_price: Decimal,
        selling_price: Decimal,
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            item_name: name.to_string(),
            description: None,
            category: Some("Equipment".to_string()),
            barcode: None,
            units: Some("pcs".to_string()),
            location_name: None,
            opening_stock: stock,
            current_stock: stock,
            cost_price,
            selling_price,
            reorder_level: 5,
            created_at: now,
            updated_at: now,
        };
        self.store.seed_product(product.clone()).await;
        product
    }

    pub async fn add_lender(&self, name: &str, debt: Decimal) -> Lender {
        let now = Utc::now();
        let lender = Lender {
            id: Uuid::new_v4(),
            customer_code: "CUST-00001".to_string(),
            name: name.to_string(),
            phone: None,
            email: None,
            address: None,
            credit_limit: dec!(10000),
            current_debt: debt,
            total_paid: Decimal::ZERO,
            total_purchased: debt,
            status: LenderStatus::Active,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        self.store.seed_lender(lender.clone()).await;
        lender
    }

    pub async fn stock_of(&self, product_id: Uuid) -> i32 {
        self.store.state().await.products[&product_id].current_stock
    }

    pub async fn lender(&self, lender_id: Uuid) -> Lender {
        self.store.state().await.lenders[&lender_id].clone()
    }

    /// Replay the committed movements of a product against its stock
    pub async fn ledger_audit(&self, product_id: Uuid) -> LedgerAudit {
        let state = self.store.state().await;
        let product = &state.products[&product_id];
        let movements: Vec<_> = state
            .movements_for(product_id)
            .into_iter()
            .cloned()
            .collect();
        audit(
            product_id,
            product.opening_stock,
            product.current_stock,
            &movements,
        )
    }

    pub async fn assert_ledger_consistent(&self, product_id: Uuid) {
        let report = self.ledger_audit(product_id).await;
        assert!(report.is_consistent(), "ledger drifted: {:?}", report);
    }
}
