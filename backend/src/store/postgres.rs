//! PostgreSQL unit of work
//!
//! Each unit of work owns one sqlx transaction. Rows read for a
//! read-modify-write are locked with `SELECT ... FOR UPDATE`, and product
//! stock is written with a compare-and-swap guard on the previous value.

use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Store, UnitOfWork};
use crate::error::AppResult;
use crate::models::{
    AdditionalStock, Lender, Payment, Product, Sale, SaleReturn, StockLevel, StockMovement,
    WeeklyStockReport,
};

pub(crate) const PRODUCT_COLUMNS: &str = "id, item_name, description, category, barcode, units, \
    location_name, opening_stock, current_stock, cost_price, selling_price, reorder_level, \
    created_at, updated_at";

pub(crate) const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, quantity_before, \
    quantity_after, reason, reference, notes, created_by, created_at";

pub(crate) const SALE_COLUMNS: &str = "id, sale_number, order_number, product_id, quantity, unit_price, \
    total_amount, customer_id, customer_name, payment_method, amount_paid, amount_due, \
    payment_status, sold_by, notes, sale_date, created_at, updated_at";

pub(crate) const RETURN_COLUMNS: &str = "id, return_number, sale_id, product_id, quantity, reason, \
    refund_amount, refund_method, status, returned_by, notes, return_date, updated_at";

pub(crate) const LENDER_COLUMNS: &str = "id, customer_code, name, phone, email, address, credit_limit, \
    current_debt, total_paid, total_purchased, status, notes, created_at, updated_at";

pub(crate) const ADDITIONAL_STOCK_COLUMNS: &str = "id, batch_number, product_id, quantity, cost_per_unit, \
    total_cost, supplier, invoice_number, purchase_date, week_number, year, notes, created_by, \
    created_at, updated_at";

pub(crate) const REPORT_COLUMNS: &str = "id, week_number, year, start_date, end_date, opening_stock, \
    closing_stock, total_value, notes, closed_at, created_at";

/// Store backed by a Postgres pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_product(&mut self, id: Uuid) -> AppResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(product)
    }

    async fn set_product_stock(
        &mut self,
        id: Uuid,
        expected: i32,
        new_stock: i32,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = $3, updated_at = NOW()
            WHERE id = $1 AND current_stock = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_stock)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO products ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            PRODUCT_COLUMNS
        ))
        .bind(product.id)
        .bind(&product.item_name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.barcode)
        .bind(&product.units)
        .bind(&product.location_name)
        .bind(product.opening_stock)
        .bind(product.current_stock)
        .bind(product.cost_price)
        .bind(product.selling_price)
        .bind(product.reorder_level)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET item_name = $2, description = $3, category = $4, barcode = $5, units = $6,
                location_name = $7, cost_price = $8, selling_price = $9, reorder_level = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.item_name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(&product.barcode)
        .bind(&product.units)
        .bind(&product.location_name)
        .bind(product.cost_price)
        .bind(product.selling_price)
        .bind(product.reorder_level)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_product(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn stock_levels(&mut self) -> AppResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            "SELECT id AS product_id, current_stock, cost_price FROM products ORDER BY item_name",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(levels)
    }

    async fn list_products(&mut self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products ORDER BY item_name",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(products)
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO stock_movements ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            MOVEMENT_COLUMNS
        ))
        .bind(movement.id)
        .bind(movement.product_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.quantity_before)
        .bind(movement.quantity_after)
        .bind(movement.reason)
        .bind(movement.reference)
        .bind(&movement.notes)
        .bind(movement.created_by)
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn product_movements(&mut self, product_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {} FROM stock_movements WHERE product_id = $1 ORDER BY seq",
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(movements)
    }

    async fn insert_sale(&mut self, sale: &Sale) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO sales ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
             $13, $14, $15, $16, $17, $18)",
            SALE_COLUMNS
        ))
        .bind(sale.id)
        .bind(&sale.sale_number)
        .bind(&sale.order_number)
        .bind(sale.product_id)
        .bind(sale.quantity)
        .bind(sale.unit_price)
        .bind(sale.total_amount)
        .bind(sale.customer_id)
        .bind(&sale.customer_name)
        .bind(&sale.payment_method)
        .bind(sale.amount_paid)
        .bind(sale.amount_due)
        .bind(sale.payment_status)
        .bind(sale.sold_by)
        .bind(&sale.notes)
        .bind(sale.sale_date)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_sale(&mut self, id: Uuid) -> AppResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE id = $1 FOR UPDATE",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(sale)
    }

    async fn update_sale_payment(&mut self, sale: &Sale) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE sales
            SET amount_paid = $2, amount_due = $3, payment_status = $4, payment_method = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(sale.id)
        .bind(sale.amount_paid)
        .bind(sale.amount_due)
        .bind(sale.payment_status)
        .bind(&sale.payment_method)
        .bind(sale.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn returned_quantity(&mut self, sale_id: Uuid) -> AppResult<i32> {
        let total = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT SUM(quantity)::BIGINT FROM returns WHERE sale_id = $1",
        )
        .bind(sale_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(total.unwrap_or(0).clamp(0, i64::from(i32::MAX)) as i32)
    }

    async fn insert_return(&mut self, record: &SaleReturn) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO returns ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            RETURN_COLUMNS
        ))
        .bind(record.id)
        .bind(&record.return_number)
        .bind(record.sale_id)
        .bind(record.product_id)
        .bind(record.quantity)
        .bind(&record.reason)
        .bind(record.refund_amount)
        .bind(&record.refund_method)
        .bind(record.status)
        .bind(record.returned_by)
        .bind(&record.notes)
        .bind(record.return_date)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_return(&mut self, id: Uuid) -> AppResult<Option<SaleReturn>> {
        let record = sqlx::query_as::<_, SaleReturn>(&format!(
            "SELECT {} FROM returns WHERE id = $1 FOR UPDATE",
            RETURN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(record)
    }

    async fn update_return(&mut self, record: &SaleReturn) -> AppResult<()> {
        sqlx::query("UPDATE returns SET status = $2, notes = $3, updated_at = $4 WHERE id = $1")
            .bind(record.id)
            .bind(record.status)
            .bind(&record.notes)
            .bind(record.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_lender(&mut self, lender: &Lender) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO lenders ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            LENDER_COLUMNS
        ))
        .bind(lender.id)
        .bind(&lender.customer_code)
        .bind(&lender.name)
        .bind(&lender.phone)
        .bind(&lender.email)
        .bind(&lender.address)
        .bind(lender.credit_limit)
        .bind(lender.current_debt)
        .bind(lender.total_paid)
        .bind(lender.total_purchased)
        .bind(lender.status)
        .bind(&lender.notes)
        .bind(lender.created_at)
        .bind(lender.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_lender(&mut self, id: Uuid) -> AppResult<Option<Lender>> {
        let lender = sqlx::query_as::<_, Lender>(&format!(
            "SELECT {} FROM lenders WHERE id = $1 FOR UPDATE",
            LENDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(lender)
    }

    async fn update_lender(&mut self, lender: &Lender) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE lenders
            SET name = $2, phone = $3, email = $4, address = $5, credit_limit = $6,
                current_debt = $7, total_paid = $8, total_purchased = $9, status = $10,
                notes = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(lender.id)
        .bind(&lender.name)
        .bind(&lender.phone)
        .bind(&lender.email)
        .bind(&lender.address)
        .bind(lender.credit_limit)
        .bind(lender.current_debt)
        .bind(lender.total_paid)
        .bind(lender.total_purchased)
        .bind(lender.status)
        .bind(&lender.notes)
        .bind(lender.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn last_customer_code(&mut self) -> AppResult<Option<String>> {
        // Serializes code allocation between concurrent lender creations
        sqlx::query("LOCK TABLE lenders IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *self.tx)
            .await?;
        let code = sqlx::query_scalar::<_, String>(
            "SELECT customer_code FROM lenders ORDER BY customer_code DESC LIMIT 1",
        )
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(code)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, payment_number, lender_id, amount, payment_method, reference, notes,
                received_by, payment_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id)
        .bind(&payment.payment_number)
        .bind(payment.lender_id)
        .bind(payment.amount)
        .bind(&payment.payment_method)
        .bind(&payment.reference)
        .bind(&payment.notes)
        .bind(payment.received_by)
        .bind(payment.payment_date)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_additional_stock(&mut self, record: &AdditionalStock) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO additional_stock ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            ADDITIONAL_STOCK_COLUMNS
        ))
        .bind(record.id)
        .bind(&record.batch_number)
        .bind(record.product_id)
        .bind(record.quantity)
        .bind(record.cost_per_unit)
        .bind(record.total_cost)
        .bind(&record.supplier)
        .bind(&record.invoice_number)
        .bind(record.purchase_date)
        .bind(record.week_number)
        .bind(record.year)
        .bind(&record.notes)
        .bind(record.created_by)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_additional_stock(&mut self, id: Uuid) -> AppResult<Option<AdditionalStock>> {
        let record = sqlx::query_as::<_, AdditionalStock>(&format!(
            "SELECT {} FROM additional_stock WHERE id = $1 FOR UPDATE",
            ADDITIONAL_STOCK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(record)
    }

    async fn update_additional_stock(&mut self, record: &AdditionalStock) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE additional_stock
            SET quantity = $2, cost_per_unit = $3, total_cost = $4, supplier = $5,
                invoice_number = $6, purchase_date = $7, week_number = $8, year = $9,
                notes = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.quantity)
        .bind(record.cost_per_unit)
        .bind(record.total_cost)
        .bind(&record.supplier)
        .bind(&record.invoice_number)
        .bind(record.purchase_date)
        .bind(record.week_number)
        .bind(record.year)
        .bind(&record.notes)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_additional_stock(&mut self, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM additional_stock WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_report(&mut self, report: &WeeklyStockReport) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO weekly_stock_reports ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            REPORT_COLUMNS
        ))
        .bind(report.id)
        .bind(report.week_number)
        .bind(report.year)
        .bind(report.start_date)
        .bind(report.end_date)
        .bind(Json(&report.opening_stock))
        .bind(Json(&report.closing_stock))
        .bind(report.total_value)
        .bind(&report.notes)
        .bind(report.closed_at)
        .bind(report.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_report(&mut self, id: Uuid) -> AppResult<Option<WeeklyStockReport>> {
        let report = sqlx::query_as::<_, WeeklyStockReport>(&format!(
            "SELECT {} FROM weekly_stock_reports WHERE id = $1 FOR UPDATE",
            REPORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(report)
    }

    async fn find_report_by_week(
        &mut self,
        week_number: i32,
        year: i32,
    ) -> AppResult<Option<WeeklyStockReport>> {
        let report = sqlx::query_as::<_, WeeklyStockReport>(&format!(
            "SELECT {} FROM weekly_stock_reports WHERE week_number = $1 AND year = $2",
            REPORT_COLUMNS
        ))
        .bind(week_number)
        .bind(year)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(report)
    }

    async fn update_report(&mut self, report: &WeeklyStockReport) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE weekly_stock_reports
            SET closing_stock = $2, total_value = $3, notes = $4, closed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(report.id)
        .bind(Json(&report.closing_stock))
        .bind(report.total_value)
        .bind(&report.notes)
        .bind(report.closed_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
