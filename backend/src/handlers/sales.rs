//! HTTP handlers for sales

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{DateRange, PaginatedResponse, Pagination, Permission, Sale};
use crate::services::queries::{SaleFilter, SaleView, SalesSummary};
use crate::services::sales::{
    BulkSaleInput, BulkSaleResult, CreateSaleInput, PaymentOutcome, SaleDetails,
    UpdatePaymentInput,
};
use crate::services::{QueryService, SalesService};
use crate::AppState;

fn sales_service(state: &AppState) -> SalesService {
    SalesService::new(state.transactor.clone(), state.activity.clone())
}

pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<SaleFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Sale>>> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let sales = QueryService::new(state.db)
        .list_sales(filter, pagination)
        .await?;
    Ok(Json(sales))
}

pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleView>> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let sale = QueryService::new(state.db).sale_detail(sale_id).await?;
    Ok(Json(sale))
}

pub async fn get_sales_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(range): Query<DateRange>,
) -> AppResult<Json<SalesSummary>> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let summary = QueryService::new(state.db).sales_summary(range).await?;
    Ok(Json(summary))
}

pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleDetails>)> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let details = sales_service(&state)
        .create_sale(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(details)))
}

/// Several lines under one order number, all or nothing
pub async fn create_bulk_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BulkSaleInput>,
) -> AppResult<(StatusCode, Json<BulkSaleResult>)> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let result = sales_service(&state)
        .create_bulk_sale(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn update_sale_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(input): Json<UpdatePaymentInput>,
) -> AppResult<Json<PaymentOutcome>> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let outcome = sales_service(&state)
        .update_payment(current_user.0.user_id, sale_id, input)
        .await?;
    Ok(Json(outcome))
}
