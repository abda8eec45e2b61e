//! Authentication service: login, staff registration and JWT handling

use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::activity::{ActivityEntry, ActivitySink};
use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::models::{validate_password, validate_username, ActivityAction, ResourceType, Role, UserProfile};

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub username: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Sign an access token for `user`
pub fn encode_token(user: &UserProfile, jwt: &JwtConfig) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::seconds(jwt.access_token_expiry)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Verify a token's signature and expiry
pub fn decode_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserProfile,
}

/// Input for an admin creating a staff account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterUserInput {
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub password: String,
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    /// Defaults to SALES
    pub role: Option<Role>,
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: Option<String>,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: Role,
    is_active: bool,
    created_at: chrono::DateTime<Utc>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role: row.role,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    jwt: JwtConfig,
    activity: Arc<dyn ActivitySink>,
}

impl AuthService {
    pub fn new(db: PgPool, jwt: JwtConfig, activity: Arc<dyn ActivitySink>) -> Self {
        Self { db, jwt, activity }
    }

    /// Check a username and password and issue an access token
    pub async fn login(&self, input: LoginInput, ip_address: Option<String>) -> AppResult<LoginResponse> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, password_hash, first_name, last_name, role, is_active,
                   created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(&input.username)
        .fetch_optional(&self.db)
        .await?;

        let row = match row {
            Some(row) if row.is_active => row,
            _ => return Err(AppError::InvalidCredentials),
        };

        let valid = verify(&input.password, &row.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            tracing::warn!(username = %row.username, "Failed login attempt");
            let mut entry = ActivityEntry::new(
                row.id,
                ActivityAction::LoginFailed,
                ResourceType::User,
                format!("Failed login attempt for user {}", row.username),
            )
            .resource(row.id);
            entry.ip_address = ip_address;
            self.activity.record(entry);
            return Err(AppError::InvalidCredentials);
        }

        let user = UserProfile::from(row);
        let token = encode_token(&user, &self.jwt)?;

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        let mut entry = ActivityEntry::new(
            user.id,
            ActivityAction::Login,
            ResourceType::User,
            format!("User {} logged in", user.username),
        )
        .resource(user.id);
        entry.ip_address = ip_address;
        self.activity.record(entry);

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry,
            user,
        })
    }

    /// Create a staff account (admin only)
    pub async fn register(&self, actor: Uuid, input: RegisterUserInput) -> AppResult<UserProfile> {
        input.validate()?;
        validate_username(&input.username).map_err(|m| AppError::validation("username", m))?;
        validate_password(&input.password).map_err(|m| AppError::validation("password", m))?;

        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        let role = input.role.unwrap_or(Role::Sales);

        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name, role)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, first_name, last_name, role, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.username)
        .bind(&input.email)
        .bind(&password_hash)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(role)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        self.activity.record(
            ActivityEntry::new(
                actor,
                ActivityAction::Create,
                ResourceType::User,
                format!("Admin created user {} ({})", user.username, user.role),
            )
            .resource(user.id),
        );

        Ok(user)
    }

    /// Create the first administrator if no user exists yet
    pub async fn ensure_admin(&self, username: &str, password: &str) -> AppResult<Option<UserProfile>> {
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;
        if existing > 0 {
            return Ok(None);
        }

        validate_username(username).map_err(|m| AppError::validation("admin_username", m))?;
        validate_password(password).map_err(|m| AppError::validation("admin_password", m))?;
        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;

        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO users (id, username, password_hash, first_name, last_name, role)
            VALUES ($1, $2, $3, 'Admin', 'User', 'ADMIN')
            ON CONFLICT (username) DO NOTHING
            RETURNING id, username, email, first_name, last_name, role, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(&password_hash)
        .fetch_optional(&self.db)
        .await?;

        if let Some(user) = &user {
            tracing::info!(user_id = %user.id, username = %user.username, "Bootstrap administrator created");
        }
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<UserProfile> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, username, email, first_name, last_name, role, is_active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    pub async fn list_users(&self) -> AppResult<Vec<UserProfile>> {
        let users = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, username, email, first_name, last_name, role, is_active, created_at
            FROM users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: 3600,
        }
    }

    fn user(role: Role) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            username: "ama.owusu".to_string(),
            email: None,
            first_name: None,
            last_name: None,
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let user = user(Role::Manager);
        let token = encode_token(&user, &jwt()).unwrap();
        let claims = decode_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, Role::Manager);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = encode_token(&user(Role::Admin), &jwt()).unwrap();
        assert!(matches!(
            decode_token(&token, "other-secret"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = JwtConfig {
            secret: "test-secret".to_string(),
            access_token_expiry: -3600,
        };
        let token = encode_token(&user(Role::Sales), &config).unwrap();
        assert!(matches!(
            decode_token(&token, "test-secret"),
            Err(AppError::TokenExpired)
        ));
    }
}
