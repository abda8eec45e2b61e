//! Authentication middleware
//!
//! Validates the bearer token and attaches the caller to the request. Role
//! checks happen in handlers through [`AuthUser::require`].

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Permission, Role};
use crate::services::auth::decode_token;
use crate::AppState;

/// Authenticated user information extracted from the token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn can(&self, permission: Permission) -> bool {
        self.role.can(permission)
    }

    /// Fails with `InsufficientPermissions` unless the role grants `permission`
    pub fn require(&self, permission: Permission) -> AppResult<()> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                role = self.role.as_str(),
                ?permission,
                "permission denied"
            );
            Err(AppError::InsufficientPermissions)
        }
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
            .into_response();
    };

    let claims = match decode_token(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        return AppError::InvalidToken.into_response();
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        username: claims.username,
        role: claims.role,
    });

    next.run(request).await
}

/// Extractor for the authenticated user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}
