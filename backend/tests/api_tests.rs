//! HTTP boundary tests
//!
//! Authentication and role checks are decided before any query runs, so the
//! router is exercised with a lazily connected pool that is never used.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use stock_ledger_backend::config::JwtConfig;
use stock_ledger_backend::models::{Role, UserProfile};
use stock_ledger_backend::services::auth::encode_token;
use stock_ledger_backend::{create_app, AppState, Config};
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> (Router, Config) {
    let config = Config::default();
    let db = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .unwrap();
    (create_app(AppState::new(db, config.clone())), config)
}

fn token(role: Role, jwt: &JwtConfig) -> String {
    let user = UserProfile {
        id: Uuid::new_v4(),
        username: format!("{}_user", role.as_str().to_lowercase()),
        email: None,
        first_name: None,
        last_name: None,
        role,
        is_active: true,
        created_at: Utc::now(),
    };
    encode_token(&user, jwt).unwrap()
}

fn request(method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn error_code(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["error"]["code"].as_str().unwrap_or_default().to_string()
}

fn product_body() -> Value {
    serde_json::json!({
        "item_name": "GREASE",
        "initial_stock": 10,
        "cost_price": "30",
        "selling_price": "35"
    })
}

#[tokio::test]
async fn test_root_is_public() {
    let (app, _) = app();
    let response = app
        .oneshot(request(Method::GET, "/", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (app, _) = app();
    let response = app
        .oneshot(request(Method::GET, "/api/v1/products", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let (app, _) = app();
    let response = app
        .oneshot(request(Method::GET, "/api/v1/sales", Some("not.a.jwt"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "INVALID_TOKEN");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let (app, config) = app();
    let forged = JwtConfig {
        secret: "some-other-secret".to_string(),
        ..config.jwt.clone()
    };
    let response = app
        .oneshot(request(
            Method::GET,
            "/api/v1/sales",
            Some(&token(Role::Admin, &forged)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let (app, config) = app();
    let expired = JwtConfig {
        access_token_expiry: -3600,
        ..config.jwt.clone()
    };
    let response = app
        .oneshot(request(
            Method::GET,
            "/api/v1/products",
            Some(&token(Role::Admin, &expired)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "TOKEN_EXPIRED");
}

#[tokio::test]
async fn test_sales_role_cannot_manage_products() {
    let (app, config) = app();
    let response = app
        .oneshot(request(
            Method::POST,
            "/api/v1/products",
            Some(&token(Role::Sales, &config.jwt)),
            Some(product_body()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(response).await, "INSUFFICIENT_PERMISSIONS");
}

#[tokio::test]
async fn test_sales_role_cannot_touch_stock_reports_or_returns() {
    let (app, config) = app();
    let bearer = token(Role::Sales, &config.jwt);

    for uri in ["/api/v1/stock-reports", "/api/v1/returns"] {
        let response = app
            .clone()
            .oneshot(request(Method::GET, uri, Some(&bearer), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn test_only_admin_sees_activity_and_users() {
    let (app, config) = app();
    let bearer = token(Role::Manager, &config.jwt);

    for uri in ["/api/v1/activity", "/api/v1/users"] {
        let response = app
            .clone()
            .oneshot(request(Method::GET, uri, Some(&bearer), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn test_activity_views_are_admin_only() {
    let (app, config) = app();
    let id = Uuid::new_v4();
    let uris = [
        "/api/v1/activity/summary?start_date=2024-01-01".to_string(),
        "/api/v1/activity/types".to_string(),
        format!("/api/v1/activity/user/{}", id),
        format!("/api/v1/activity/resource/{}", id),
    ];

    for role in [Role::Manager, Role::Sales] {
        let bearer = token(role, &config.jwt);
        for uri in &uris {
            let response = app
                .clone()
                .oneshot(request(Method::GET, uri, Some(&bearer), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{:?} {}", role, uri);
        }
    }

    let response = app
        .oneshot(request(Method::GET, &uris[3], None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_resource_history_requires_a_uuid() {
    let (app, config) = app();
    let response = app
        .oneshot(request(
            Method::GET,
            "/api/v1/activity/resource/not-a-uuid",
            Some(&token(Role::Admin, &config.jwt)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_manager_cannot_register_users() {
    let (app, config) = app();
    let response = app
        .oneshot(request(
            Method::POST,
            "/api/v1/auth/register",
            Some(&token(Role::Manager, &config.jwt)),
            Some(serde_json::json!({
                "username": "new_clerk",
                "password": "long-enough-password"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
