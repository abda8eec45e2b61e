//! HTTP handlers for inventory valuation, movement history and purchased stock

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{PaginatedResponse, Pagination, Permission};
use crate::services::additional_stock::{
    AdditionalStockDetails, CreateAdditionalStockInput, UpdateAdditionalStockInput,
};
use crate::services::ledger::LedgerPosting;
use crate::services::queries::{InventoryValuation, MovementFilter, MovementView};
use crate::services::{AdditionalStockService, QueryService};
use crate::AppState;

fn additional_stock_service(state: &AppState) -> AdditionalStockService {
    AdditionalStockService::new(state.transactor.clone(), state.activity.clone())
}

pub async fn get_inventory_valuation(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<InventoryValuation>> {
    current_user.0.require(Permission::ViewInventory)?;
    let valuation = QueryService::new(state.db).inventory_valuation().await?;
    Ok(Json(valuation))
}

pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<MovementView>>> {
    current_user.0.require(Permission::ViewInventory)?;
    let movements = QueryService::new(state.db)
        .movement_history(filter, pagination)
        .await?;
    Ok(Json(movements))
}

/// Receive a purchased batch into stock
pub async fn create_additional_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateAdditionalStockInput>,
) -> AppResult<(StatusCode, Json<AdditionalStockDetails>)> {
    current_user.0.require(Permission::ManageStock)?;
    let details = additional_stock_service(&state)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn update_additional_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
    Json(input): Json<UpdateAdditionalStockInput>,
) -> AppResult<Json<AdditionalStockDetails>> {
    current_user.0.require(Permission::ManageStock)?;
    let details = additional_stock_service(&state)
        .update(current_user.0.user_id, record_id, input)
        .await?;
    Ok(Json(details))
}

pub async fn delete_additional_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<LedgerPosting>> {
    current_user.0.require(Permission::ManageStock)?;
    let posting = additional_stock_service(&state)
        .delete(current_user.0.user_id, record_id)
        .await?;
    Ok(Json(posting))
}
