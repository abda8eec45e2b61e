//! Stock Ledger POS backend
//!
//! Inventory ledger, sales, returns, credit customers and weekly stock
//! reports behind an axum JSON API.

use std::sync::Arc;

use axum::{http::HeaderValue, routing::get, Router};
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::{ActivitySink, PgActivitySink};
use store::{PgStore, Transactor};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub transactor: Transactor,
    pub activity: Arc<dyn ActivitySink>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed by Postgres for both the ledger and the activity log
    pub fn new(db: PgPool, config: Config) -> Self {
        let transactor = Transactor::new(
            Arc::new(PgStore::new(db.clone())),
            config.ledger.max_conflict_retries,
        );
        Self {
            activity: Arc::new(PgActivitySink::new(db.clone())),
            db,
            transactor,
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors.allowed_origins);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}

async fn root() -> &'static str {
    "Stock Ledger API v1"
}
