//! Read-side queries
//!
//! Listings, detail views and summaries read straight from the pool. Nothing
//! here writes.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    AdditionalStock, DateRange, Lender, LenderStatus, MovementType, PaginatedResponse,
    Pagination, Payment, PaymentStatus, Product, ReturnStatus, Sale, SaleReturn, StockMovement,
    WeeklyStockReport,
};
use crate::store::postgres::{
    ADDITIONAL_STOCK_COLUMNS, LENDER_COLUMNS, MOVEMENT_COLUMNS, PRODUCT_COLUMNS, REPORT_COLUMNS,
    RETURN_COLUMNS, SALE_COLUMNS,
};

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub low_stock: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnFilter {
    pub status: Option<ReturnStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LenderFilter {
    pub search: Option<String>,
    pub status: Option<LenderStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub year: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub week_number: i32,
    pub year: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub is_low_stock: bool,
    pub recent_movements: Vec<StockMovement>,
    pub recent_sales: Vec<Sale>,
}

/// Movement with the product's name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MovementView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub movement: StockMovement,
    pub item_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryValuation {
    pub cost_value: Decimal,
    pub selling_value: Decimal,
    pub potential_profit: Decimal,
    pub total_items: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleView {
    #[serde(flatten)]
    pub sale: Sale,
    pub product: Option<Product>,
    pub lender: Option<Lender>,
    pub returns: Vec<SaleReturn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesSummary {
    pub total_sales: i64,
    pub total_revenue: Decimal,
    pub pending_payments: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LenderDetail {
    #[serde(flatten)]
    pub lender: Lender,
    pub recent_sales: Vec<Sale>,
    pub recent_payments: Vec<Payment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LendersWithDebt {
    pub lenders: Vec<Lender>,
    pub total_debt: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyAdditionalStock {
    pub week_number: i32,
    pub year: i32,
    pub records: Vec<AdditionalStock>,
    pub total_quantity: i64,
    pub total_cost: Decimal,
}

fn like(search: &Option<String>) -> Option<String> {
    search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

/// Day after `end`, so date ranges include their last day
fn exclusive_end(end: Option<NaiveDate>) -> Option<NaiveDate> {
    end.and_then(|d| d.succ_opt())
}

#[derive(Clone)]
pub struct QueryService {
    db: PgPool,
}

impl QueryService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Products and inventory
    // ------------------------------------------------------------------

    pub async fn list_products(
        &self,
        filter: ProductFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Product>> {
        let search = like(&filter.search);
        let low_stock = filter.low_stock.unwrap_or(false);

        const WHERE: &str = r#"
            WHERE ($1::text IS NULL
                   OR item_name ILIKE $1 OR description ILIKE $1 OR barcode ILIKE $1)
              AND ($2::text IS NULL OR category = $2)
              AND (NOT $3 OR current_stock <= reorder_level)
        "#;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products {} ORDER BY item_name LIMIT $4 OFFSET $5",
            PRODUCT_COLUMNS, WHERE
        ))
        .bind(&search)
        .bind(&filter.category)
        .bind(low_stock)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM products {}", WHERE))
            .bind(&search)
            .bind(&filter.category)
            .bind(low_stock)
            .fetch_one(&self.db)
            .await?;

        Ok(PaginatedResponse::new(products, total, &pagination))
    }

    pub async fn product_detail(&self, id: Uuid) -> AppResult<ProductDetail> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let recent_movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {} FROM stock_movements WHERE product_id = $1 ORDER BY seq DESC LIMIT 20",
            MOVEMENT_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let recent_sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE product_id = $1 ORDER BY sale_date DESC LIMIT 10",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(ProductDetail {
            is_low_stock: product.is_low_stock(),
            product,
            recent_movements,
            recent_sales,
        })
    }

    pub async fn categories(&self) -> AppResult<Vec<String>> {
        let categories = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT category FROM products WHERE category IS NOT NULL ORDER BY category",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(categories)
    }

    pub async fn low_stock_products(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE current_stock <= reorder_level ORDER BY current_stock",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(products)
    }

    pub async fn inventory_valuation(&self) -> AppResult<InventoryValuation> {
        let (cost_value, selling_value, total_items) =
            sqlx::query_as::<_, (Option<Decimal>, Option<Decimal>, Option<i64>)>(
                r#"
                SELECT SUM(current_stock * cost_price),
                       SUM(current_stock * selling_price),
                       SUM(current_stock)::BIGINT
                FROM products
                "#,
            )
            .fetch_one(&self.db)
            .await?;

        let cost_value = cost_value.unwrap_or(Decimal::ZERO);
        let selling_value = selling_value.unwrap_or(Decimal::ZERO);
        Ok(InventoryValuation {
            cost_value,
            selling_value,
            potential_profit: selling_value - cost_value,
            total_items: total_items.unwrap_or(0),
        })
    }

    pub async fn movement_history(
        &self,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<MovementView>> {
        let end = exclusive_end(filter.end_date);

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR m.product_id = $1)
              AND ($2::movement_type IS NULL OR m.movement_type = $2)
              AND ($3::date IS NULL OR m.created_at >= $3)
              AND ($4::date IS NULL OR m.created_at < $4)
        "#;

        let movements = sqlx::query_as::<_, MovementView>(&format!(
            r#"
            SELECT m.id, m.product_id, m.movement_type, m.quantity, m.quantity_before,
                   m.quantity_after, m.reason, m.reference, m.notes, m.created_by, m.created_at,
                   p.item_name
            FROM stock_movements m
            JOIN products p ON p.id = m.product_id
            {}
            ORDER BY m.seq DESC
            LIMIT $5 OFFSET $6
            "#,
            WHERE
        ))
        .bind(filter.product_id)
        .bind(filter.movement_type)
        .bind(filter.start_date)
        .bind(end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM stock_movements m {}",
            WHERE
        ))
        .bind(filter.product_id)
        .bind(filter.movement_type)
        .bind(filter.start_date)
        .bind(end)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(movements, total, &pagination))
    }

    // ------------------------------------------------------------------
    // Sales and returns
    // ------------------------------------------------------------------

    pub async fn list_sales(
        &self,
        filter: SaleFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Sale>> {
        let end = exclusive_end(filter.end_date);

        const WHERE: &str = r#"
            WHERE ($1::date IS NULL OR sale_date >= $1)
              AND ($2::date IS NULL OR sale_date < $2)
              AND ($3::payment_status IS NULL OR payment_status = $3)
              AND ($4::uuid IS NULL OR customer_id = $4)
        "#;

        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales {} ORDER BY sale_date DESC LIMIT $5 OFFSET $6",
            SALE_COLUMNS, WHERE
        ))
        .bind(filter.start_date)
        .bind(end)
        .bind(filter.payment_status)
        .bind(filter.customer_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM sales {}", WHERE))
            .bind(filter.start_date)
            .bind(end)
            .bind(filter.payment_status)
            .bind(filter.customer_id)
            .fetch_one(&self.db)
            .await?;

        Ok(PaginatedResponse::new(sales, total, &pagination))
    }

    pub async fn sale_detail(&self, id: Uuid) -> AppResult<SaleView> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE id = $1",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sale".to_string()))?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(sale.product_id)
        .fetch_optional(&self.db)
        .await?;

        let lender = match sale.customer_id {
            Some(customer_id) => {
                sqlx::query_as::<_, Lender>(&format!(
                    "SELECT {} FROM lenders WHERE id = $1",
                    LENDER_COLUMNS
                ))
                .bind(customer_id)
                .fetch_optional(&self.db)
                .await?
            }
            None => None,
        };

        let returns = sqlx::query_as::<_, SaleReturn>(&format!(
            "SELECT {} FROM returns WHERE sale_id = $1 ORDER BY return_date",
            RETURN_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(SaleView {
            sale,
            product,
            lender,
            returns,
        })
    }

    pub async fn sales_summary(&self, range: DateRange) -> AppResult<SalesSummary> {
        let end = exclusive_end(range.end_date);
        let (total_sales, total_revenue, pending_payments) =
            sqlx::query_as::<_, (i64, Option<Decimal>, Option<Decimal>)>(
                r#"
                SELECT COUNT(*),
                       SUM(total_amount),
                       SUM(amount_due) FILTER (WHERE payment_status <> 'PAID')
                FROM sales
                WHERE ($1::date IS NULL OR sale_date >= $1)
                  AND ($2::date IS NULL OR sale_date < $2)
                "#,
            )
            .bind(range.start_date)
            .bind(end)
            .fetch_one(&self.db)
            .await?;

        Ok(SalesSummary {
            total_sales,
            total_revenue: total_revenue.unwrap_or(Decimal::ZERO),
            pending_payments: pending_payments.unwrap_or(Decimal::ZERO),
        })
    }

    pub async fn list_returns(
        &self,
        filter: ReturnFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<SaleReturn>> {
        let end = exclusive_end(filter.end_date);

        const WHERE: &str = r#"
            WHERE ($1::return_status IS NULL OR status = $1)
              AND ($2::date IS NULL OR return_date >= $2)
              AND ($3::date IS NULL OR return_date < $3)
        "#;

        let returns = sqlx::query_as::<_, SaleReturn>(&format!(
            "SELECT {} FROM returns {} ORDER BY return_date DESC LIMIT $4 OFFSET $5",
            RETURN_COLUMNS, WHERE
        ))
        .bind(filter.status)
        .bind(filter.start_date)
        .bind(end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM returns {}", WHERE))
            .bind(filter.status)
            .bind(filter.start_date)
            .bind(end)
            .fetch_one(&self.db)
            .await?;

        Ok(PaginatedResponse::new(returns, total, &pagination))
    }

    // ------------------------------------------------------------------
    // Lenders
    // ------------------------------------------------------------------

    pub async fn list_lenders(
        &self,
        filter: LenderFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Lender>> {
        let search = like(&filter.search);

        const WHERE: &str = r#"
            WHERE ($1::text IS NULL
                   OR name ILIKE $1 OR customer_code ILIKE $1 OR phone ILIKE $1)
              AND ($2::lender_status IS NULL OR status = $2)
        "#;

        let lenders = sqlx::query_as::<_, Lender>(&format!(
            "SELECT {} FROM lenders {} ORDER BY name LIMIT $3 OFFSET $4",
            LENDER_COLUMNS, WHERE
        ))
        .bind(&search)
        .bind(filter.status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM lenders {}", WHERE))
            .bind(&search)
            .bind(filter.status)
            .fetch_one(&self.db)
            .await?;

        Ok(PaginatedResponse::new(lenders, total, &pagination))
    }

    pub async fn lender_detail(&self, id: Uuid) -> AppResult<LenderDetail> {
        let lender = sqlx::query_as::<_, Lender>(&format!(
            "SELECT {} FROM lenders WHERE id = $1",
            LENDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Lender".to_string()))?;

        let recent_sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {} FROM sales WHERE customer_id = $1 ORDER BY sale_date DESC LIMIT 20",
            SALE_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let recent_payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, payment_number, lender_id, amount, payment_method, reference, notes,
                   received_by, payment_date
            FROM payments
            WHERE lender_id = $1
            ORDER BY payment_date DESC
            LIMIT 20
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(LenderDetail {
            lender,
            recent_sales,
            recent_payments,
        })
    }

    pub async fn lenders_with_debt(&self) -> AppResult<LendersWithDebt> {
        let lenders = sqlx::query_as::<_, Lender>(&format!(
            "SELECT {} FROM lenders WHERE current_debt > 0 ORDER BY current_debt DESC",
            LENDER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        let total_debt = lenders
            .iter()
            .try_fold(Decimal::ZERO, |total, l| total.checked_add(l.current_debt))
            .ok_or_else(|| AppError::validation("current_debt", "Total debt out of range"))?;
        Ok(LendersWithDebt {
            lenders,
            total_debt,
        })
    }

    // ------------------------------------------------------------------
    // Weekly reports
    // ------------------------------------------------------------------

    pub async fn list_reports(
        &self,
        filter: ReportFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<WeeklyStockReport>> {
        let reports = sqlx::query_as::<_, WeeklyStockReport>(&format!(
            r#"
            SELECT {} FROM weekly_stock_reports
            WHERE ($1::int IS NULL OR year = $1)
            ORDER BY year DESC, week_number DESC
            LIMIT $2 OFFSET $3
            "#,
            REPORT_COLUMNS
        ))
        .bind(filter.year)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM weekly_stock_reports WHERE ($1::int IS NULL OR year = $1)",
        )
        .bind(filter.year)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(reports, total, &pagination))
    }

    pub async fn weekly_additional_stock(&self, week: WeekQuery) -> AppResult<WeeklyAdditionalStock> {
        let records = sqlx::query_as::<_, AdditionalStock>(&format!(
            r#"
            SELECT {} FROM additional_stock
            WHERE week_number = $1 AND year = $2
            ORDER BY purchase_date, created_at
            "#,
            ADDITIONAL_STOCK_COLUMNS
        ))
        .bind(week.week_number)
        .bind(week.year)
        .fetch_all(&self.db)
        .await?;

        let total_quantity = records.iter().map(|r| i64::from(r.quantity)).sum();
        let total_cost = records
            .iter()
            .try_fold(Decimal::ZERO, |total, r| total.checked_add(r.total_cost))
            .ok_or_else(|| AppError::validation("total_cost", "Weekly cost out of range"))?;
        Ok(WeeklyAdditionalStock {
            week_number: week.week_number,
            year: week.year,
            records,
            total_quantity,
            total_cost,
        })
    }
}
