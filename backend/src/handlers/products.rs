//! HTTP handlers for the product catalogue

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::ledger::LedgerAudit;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{PaginatedResponse, Pagination, Permission, Product};
use crate::services::ledger::LedgerPosting;
use crate::services::products::{AdjustStockInput, CreateProductInput, UpdateProductInput};
use crate::services::queries::{ProductDetail, ProductFilter};
use crate::services::{ProductService, QueryService};
use crate::AppState;

fn product_service(state: &AppState) -> ProductService {
    ProductService::new(state.transactor.clone(), state.activity.clone())
}

pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Product>>> {
    current_user.0.require(Permission::ViewInventory)?;
    let products = QueryService::new(state.db)
        .list_products(filter, pagination)
        .await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductDetail>> {
    current_user.0.require(Permission::ViewInventory)?;
    let product = QueryService::new(state.db).product_detail(product_id).await?;
    Ok(Json(product))
}

pub async fn list_categories(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<String>>> {
    current_user.0.require(Permission::ViewInventory)?;
    let categories = QueryService::new(state.db).categories().await?;
    Ok(Json(categories))
}

pub async fn list_low_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    current_user.0.require(Permission::ViewInventory)?;
    let products = QueryService::new(state.db).low_stock_products().await?;
    Ok(Json(products))
}

pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    current_user.0.require(Permission::ManageProducts)?;
    let product = product_service(&state)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    current_user.0.require(Permission::ManageProducts)?;
    let product = product_service(&state)
        .update(current_user.0.user_id, product_id, input)
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Permission::ManageProducts)?;
    product_service(&state)
        .delete(current_user.0.user_id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Manual stock correction, signed quantity
pub async fn adjust_product_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<LedgerPosting>> {
    current_user.0.require(Permission::ManageStock)?;
    let posting = product_service(&state)
        .adjust_stock(current_user.0.user_id, product_id, input)
        .await?;
    Ok(Json(posting))
}

/// Replay the product's movements against its current stock
pub async fn verify_product_ledger(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<LedgerAudit>> {
    current_user.0.require(Permission::ManageStock)?;
    let audit = product_service(&state).verify_ledger(product_id).await?;
    Ok(Json(audit))
}
