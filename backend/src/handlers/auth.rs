//! Authentication and user handlers

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};

use super::client_ip;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Permission, UserProfile};
use crate::services::auth::{LoginInput, LoginResponse, RegisterUserInput};
use crate::services::AuthService;
use crate::AppState;

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.config.jwt.clone(),
        state.activity.clone(),
    )
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<LoginResponse>> {
    let response = auth_service(&state)
        .login(input, client_ip(&headers))
        .await?;
    Ok(Json(response))
}

/// Create a user account (admin only)
pub async fn register(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RegisterUserInput>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    current_user.0.require(Permission::ManageUsers)?;
    let user = auth_service(&state)
        .register(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn me(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<UserProfile>> {
    let user = auth_service(&state).get_user(current_user.0.user_id).await?;
    Ok(Json(user))
}

pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<UserProfile>>> {
    current_user.0.require(Permission::ManageUsers)?;
    let users = auth_service(&state).list_users().await?;
    Ok(Json(users))
}
