//! HTTP handlers for weekly stock reports

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{PaginatedResponse, Pagination, Permission, WeeklyStockReport};
use crate::services::queries::{ReportFilter, WeekQuery, WeeklyAdditionalStock};
use crate::services::stock_reports::{CloseReportInput, CreateReportInput, ReportVariance};
use crate::services::{QueryService, StockReportService};
use crate::AppState;

fn report_service(state: &AppState) -> StockReportService {
    StockReportService::new(state.transactor.clone(), state.activity.clone())
}

pub async fn list_stock_reports(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ReportFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<WeeklyStockReport>>> {
    current_user.0.require(Permission::ManageReports)?;
    let reports = QueryService::new(state.db)
        .list_reports(filter, pagination)
        .await?;
    Ok(Json(reports))
}

pub async fn create_stock_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateReportInput>,
) -> AppResult<(StatusCode, Json<WeeklyStockReport>)> {
    current_user.0.require(Permission::ManageReports)?;
    let report = report_service(&state)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// Report for the current ISO week, opened on first request
pub async fn get_current_stock_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<WeeklyStockReport>> {
    current_user.0.require(Permission::ManageReports)?;
    let report = report_service(&state).current().await?;
    Ok(Json(report))
}

pub async fn get_stock_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<WeeklyStockReport>> {
    current_user.0.require(Permission::ManageReports)?;
    let report = report_service(&state).get(report_id).await?;
    Ok(Json(report))
}

pub async fn get_stock_report_variance(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<ReportVariance>> {
    current_user.0.require(Permission::ManageReports)?;
    let variance = report_service(&state).variance(report_id).await?;
    Ok(Json(variance))
}

pub async fn close_stock_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(report_id): Path<Uuid>,
    input: Option<Json<CloseReportInput>>,
) -> AppResult<Json<WeeklyStockReport>> {
    current_user.0.require(Permission::ManageReports)?;
    let input = input.map(|Json(i)| i).unwrap_or_default();
    let report = report_service(&state)
        .close(current_user.0.user_id, report_id, input)
        .await?;
    Ok(Json(report))
}

pub async fn get_weekly_additional_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(week): Query<WeekQuery>,
) -> AppResult<Json<WeeklyAdditionalStock>> {
    current_user.0.require(Permission::ManageReports)?;
    let weekly = QueryService::new(state.db)
        .weekly_additional_stock(week)
        .await?;
    Ok(Json(weekly))
}
