//! HTTP handlers for credit customers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Lender, PaginatedResponse, Pagination, Permission};
use crate::services::lenders::{
    CreateLenderInput, LenderPayment, RecordPaymentInput, UpdateLenderInput,
    UpdateLenderStatusInput,
};
use crate::services::queries::{LenderDetail, LenderFilter, LendersWithDebt};
use crate::services::{LenderService, QueryService};
use crate::AppState;

fn lender_service(state: &AppState) -> LenderService {
    LenderService::new(state.transactor.clone(), state.activity.clone())
}

pub async fn list_lenders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<LenderFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Lender>>> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let lenders = QueryService::new(state.db)
        .list_lenders(filter, pagination)
        .await?;
    Ok(Json(lenders))
}

pub async fn list_lenders_with_debt(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<LendersWithDebt>> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let lenders = QueryService::new(state.db).lenders_with_debt().await?;
    Ok(Json(lenders))
}

pub async fn get_lender(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lender_id): Path<Uuid>,
) -> AppResult<Json<LenderDetail>> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let lender = QueryService::new(state.db).lender_detail(lender_id).await?;
    Ok(Json(lender))
}

pub async fn create_lender(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateLenderInput>,
) -> AppResult<(StatusCode, Json<Lender>)> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let lender = lender_service(&state)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(lender)))
}

pub async fn update_lender(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lender_id): Path<Uuid>,
    Json(input): Json<UpdateLenderInput>,
) -> AppResult<Json<Lender>> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let lender = lender_service(&state)
        .update(current_user.0.user_id, lender_id, input)
        .await?;
    Ok(Json(lender))
}

pub async fn update_lender_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lender_id): Path<Uuid>,
    Json(input): Json<UpdateLenderStatusInput>,
) -> AppResult<Json<Lender>> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let lender = lender_service(&state)
        .update_status(current_user.0.user_id, lender_id, input.status)
        .await?;
    Ok(Json(lender))
}

/// Payment against the lender's outstanding debt
pub async fn record_lender_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(lender_id): Path<Uuid>,
    Json(input): Json<RecordPaymentInput>,
) -> AppResult<(StatusCode, Json<LenderPayment>)> {
    current_user.0.require(Permission::SalesAndLenders)?;
    let payment = lender_service(&state)
        .record_payment(current_user.0.user_id, lender_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(payment)))
}
