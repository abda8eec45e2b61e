//! Weekly stock reports
//!
//! Reports read product stock when a week is opened and when it is closed.
//! They never write products or movements.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::activity::{ActivityEntry, ActivitySink};
use crate::error::{AppError, AppResult};
use crate::models::{
    compute_variances, iso_week_of, week_bounds, ActivityAction, ResourceType, StockSnapshot,
    StockVariance, WeeklyStockReport,
};
use crate::store::{found, Transactor, UnitOfWork};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportInput {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseReportInput {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportVariance {
    pub report: WeeklyStockReport,
    pub variances: Vec<StockVariance>,
}

/// Open a report for the ISO week containing `start_date`
pub async fn open_report(
    uow: &mut dyn UnitOfWork,
    input: &CreateReportInput,
) -> AppResult<WeeklyStockReport> {
    if input.end_date < input.start_date {
        return Err(AppError::validation(
            "end_date",
            "End date must not be before start date",
        ));
    }

    let (week_number, year) = iso_week_of(input.start_date);
    if uow.find_report_by_week(week_number, year).await?.is_some() {
        return Err(AppError::DuplicateEntry(format!(
            "report for week {} of {}",
            week_number, year
        )));
    }

    let snapshot = StockSnapshot::capture(&uow.stock_levels().await?)
        .map_err(|m| AppError::validation("cost_price", m))?;
    let report = WeeklyStockReport {
        id: Uuid::new_v4(),
        week_number,
        year,
        start_date: input.start_date,
        end_date: input.end_date,
        opening_stock: snapshot.quantities,
        closing_stock: BTreeMap::new(),
        total_value: snapshot.total_value,
        notes: input.notes.clone(),
        closed_at: None,
        created_at: Utc::now(),
    };
    uow.insert_report(&report).await?;
    Ok(report)
}

/// Take the closing snapshot. A report closes once.
pub async fn close_report(
    uow: &mut dyn UnitOfWork,
    id: Uuid,
    notes: Option<String>,
) -> AppResult<WeeklyStockReport> {
    let mut report = found(uow.lock_report(id).await?, "Report")?;
    if report.is_closed() {
        return Err(AppError::InvalidStateTransition(format!(
            "Report for week {} of {} is already closed",
            report.week_number, report.year
        )));
    }

    let snapshot = StockSnapshot::capture(&uow.stock_levels().await?)
        .map_err(|m| AppError::validation("cost_price", m))?;
    report.closing_stock = snapshot.quantities;
    report.total_value = snapshot.total_value;
    if notes.is_some() {
        report.notes = notes;
    }
    report.closed_at = Some(Utc::now());
    uow.update_report(&report).await?;
    Ok(report)
}

/// Report for the week containing `today`, opened on first request
pub async fn current_report(
    uow: &mut dyn UnitOfWork,
    today: NaiveDate,
) -> AppResult<WeeklyStockReport> {
    let (week_number, year) = iso_week_of(today);
    if let Some(report) = uow.find_report_by_week(week_number, year).await? {
        return Ok(report);
    }

    let (start_date, end_date) = week_bounds(today);
    open_report(
        uow,
        &CreateReportInput {
            start_date,
            end_date,
            notes: None,
        },
    )
    .await
}

pub async fn get_report(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<WeeklyStockReport> {
    found(uow.lock_report(id).await?, "Report")
}

/// Per-product change between the opening and closing snapshots
pub async fn report_variance(uow: &mut dyn UnitOfWork, id: Uuid) -> AppResult<ReportVariance> {
    let report = found(uow.lock_report(id).await?, "Report")?;
    let products = uow.list_products().await?;
    let variances = compute_variances(&report, &products)
        .map_err(|m| AppError::validation("cost_price", m))?;
    Ok(ReportVariance { report, variances })
}

#[derive(Clone)]
pub struct StockReportService {
    transactor: Transactor,
    activity: Arc<dyn ActivitySink>,
}

impl StockReportService {
    pub fn new(transactor: Transactor, activity: Arc<dyn ActivitySink>) -> Self {
        Self {
            transactor,
            activity,
        }
    }

    pub async fn create(&self, actor: Uuid, input: CreateReportInput) -> AppResult<WeeklyStockReport> {
        let report = self
            .transactor
            .run("create_stock_report", move |uow| {
                let input = input.clone();
                Box::pin(async move { open_report(uow, &input).await })
            })
            .await?;

        tracing::info!(
            report_id = %report.id,
            week = report.week_number,
            year = report.year,
            products = report.opening_stock.len(),
            "Weekly stock report opened"
        );
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Create,
                ResourceType::StockReport,
                format!("Opened stock report for week {} of {}", report.week_number, report.year),
            )
            .resource(report.id),
        );
        Ok(report)
    }

    pub async fn close(
        &self,
        actor: Uuid,
        id: Uuid,
        input: CloseReportInput,
    ) -> AppResult<WeeklyStockReport> {
        let report = self
            .transactor
            .run("close_stock_report", move |uow| {
                let notes = input.notes.clone();
                Box::pin(async move { close_report(uow, id, notes).await })
            })
            .await?;

        tracing::info!(
            report_id = %report.id,
            total_value = %report.total_value,
            "Weekly stock report closed"
        );
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Complete,
                ResourceType::StockReport,
                format!("Closed stock report for week {} of {}", report.week_number, report.year),
            )
            .resource(report.id),
        );
        Ok(report)
    }

    pub async fn current(&self) -> AppResult<WeeklyStockReport> {
        let today = Utc::now().date_naive();
        let run = || {
            self.transactor.run("current_stock_report", move |uow| {
                Box::pin(async move { current_report(uow, today).await })
            })
        };
        match run().await {
            // Another request opened this week's report first
            Err(AppError::DuplicateEntry(_)) => run().await,
            other => other,
        }
    }

    pub async fn get(&self, id: Uuid) -> AppResult<WeeklyStockReport> {
        self.transactor
            .run("get_stock_report", move |uow| {
                Box::pin(async move { get_report(uow, id).await })
            })
            .await
    }

    pub async fn variance(&self, id: Uuid) -> AppResult<ReportVariance> {
        self.transactor
            .run("stock_report_variance", move |uow| {
                Box::pin(async move { report_variance(uow, id).await })
            })
            .await
    }
}
