//! HTTP handlers for sale returns

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{PaginatedResponse, Pagination, Permission, SaleReturn};
use crate::services::queries::ReturnFilter;
use crate::services::returns::{CreateReturnInput, ReturnDetails, ReturnTransitionInput};
use crate::services::{QueryService, ReturnsService};
use crate::AppState;

fn returns_service(state: &AppState) -> ReturnsService {
    ReturnsService::new(state.transactor.clone(), state.activity.clone())
}

pub async fn list_returns(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ReturnFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<SaleReturn>>> {
    current_user.0.require(Permission::ManageReturns)?;
    let returns = QueryService::new(state.db)
        .list_returns(filter, pagination)
        .await?;
    Ok(Json(returns))
}

pub async fn create_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateReturnInput>,
) -> AppResult<(StatusCode, Json<ReturnDetails>)> {
    current_user.0.require(Permission::ManageReturns)?;
    let details = returns_service(&state)
        .create_return(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn approve_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(return_id): Path<Uuid>,
    input: Option<Json<ReturnTransitionInput>>,
) -> AppResult<Json<SaleReturn>> {
    current_user.0.require(Permission::ManageReturns)?;
    let input = input.map(|Json(i)| i).unwrap_or_default();
    let record = returns_service(&state)
        .approve(current_user.0.user_id, return_id, input)
        .await?;
    Ok(Json(record))
}

pub async fn complete_return(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(return_id): Path<Uuid>,
    input: Option<Json<ReturnTransitionInput>>,
) -> AppResult<Json<SaleReturn>> {
    current_user.0.require(Permission::ManageReturns)?;
    let input = input.map(|Json(i)| i).unwrap_or_default();
    let record = returns_service(&state)
        .complete(current_user.0.user_id, return_id, input)
        .await?;
    Ok(Json(record))
}
