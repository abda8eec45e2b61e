//! Activity log handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{DateRange, PaginatedResponse, Pagination, Permission};
use crate::services::activity::{ActivityFilter, ActivityLogView, ActivitySummary, ActivityTypes};
use crate::services::ActivityService;
use crate::AppState;

pub async fn list_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ActivityFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<ActivityLogView>>> {
    current_user.0.require(Permission::ViewActivity)?;
    let logs = ActivityService::new(state.db).list(filter, pagination).await?;
    Ok(Json(logs))
}

pub async fn get_activity_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(range): Query<DateRange>,
) -> AppResult<Json<ActivitySummary>> {
    current_user.0.require(Permission::ViewActivity)?;
    let summary = ActivityService::new(state.db).summary(range).await?;
    Ok(Json(summary))
}

pub async fn list_activity_types(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ActivityTypes>> {
    current_user.0.require(Permission::ViewActivity)?;
    Ok(Json(ActivityService::new(state.db).types().await?))
}

/// Activity performed by one user
pub async fn list_user_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<ActivityLogView>>> {
    current_user.0.require(Permission::ViewActivity)?;
    let logs = ActivityService::new(state.db)
        .for_user(user_id, pagination)
        .await?;
    Ok(Json(logs))
}

/// History of a single product, sale, lender or other record
pub async fn list_resource_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(resource_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<ActivityLogView>>> {
    current_user.0.require(Permission::ViewActivity)?;
    let logs = ActivityService::new(state.db)
        .for_resource(resource_id, pagination)
        .await?;
    Ok(Json(logs))
}
