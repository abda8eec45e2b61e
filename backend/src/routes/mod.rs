//! Route definitions for the stock ledger API

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Public
        .route("/health", get(handlers::health_check))
        .route("/auth/login", post(handlers::login))
        // Protected
        .merge(user_routes(state))
        .nest("/products", product_routes(state))
        .nest("/inventory", inventory_routes(state))
        .nest("/sales", sales_routes(state))
        .nest("/returns", return_routes(state))
        .nest("/lenders", lender_routes(state))
        .nest("/stock-reports", stock_report_routes(state))
        .nest("/activity", activity_routes(state))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/me", get(handlers::me))
        .route("/users", get(handlers::list_users))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn product_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route("/categories", get(handlers::list_categories))
        .route("/low-stock", get(handlers::list_low_stock))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route(
            "/:product_id/adjust-stock",
            post(handlers::adjust_product_stock),
        )
        .route("/:product_id/ledger", get(handlers::verify_product_ledger))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn inventory_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/valuation", get(handlers::get_inventory_valuation))
        .route("/movements", get(handlers::list_movements))
        .route(
            "/additional-stock",
            post(handlers::create_additional_stock),
        )
        .route(
            "/additional-stock/:record_id",
            put(handlers::update_additional_stock).delete(handlers::delete_additional_stock),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn sales_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/bulk", post(handlers::create_bulk_sale))
        .route("/summary", get(handlers::get_sales_summary))
        .route("/:sale_id", get(handlers::get_sale))
        .route("/:sale_id/payment", patch(handlers::update_sale_payment))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn return_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_returns).post(handlers::create_return),
        )
        .route("/:return_id/approve", patch(handlers::approve_return))
        .route("/:return_id/complete", patch(handlers::complete_return))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn lender_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_lenders).post(handlers::create_lender),
        )
        .route("/with-debt", get(handlers::list_lenders_with_debt))
        .route(
            "/:lender_id",
            get(handlers::get_lender).put(handlers::update_lender),
        )
        .route("/:lender_id/payment", post(handlers::record_lender_payment))
        .route("/:lender_id/status", patch(handlers::update_lender_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn stock_report_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_stock_reports).post(handlers::create_stock_report),
        )
        .route("/current", get(handlers::get_current_stock_report))
        .route(
            "/additional-stock",
            get(handlers::get_weekly_additional_stock),
        )
        .route("/:report_id", get(handlers::get_stock_report))
        .route(
            "/:report_id/variance",
            get(handlers::get_stock_report_variance),
        )
        .route("/:report_id/close", patch(handlers::close_stock_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

fn activity_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_activity))
        .route("/summary", get(handlers::get_activity_summary))
        .route("/types", get(handlers::list_activity_types))
        .route("/user/:user_id", get(handlers::list_user_activity))
        .route("/resource/:resource_id", get(handlers::list_resource_activity))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
