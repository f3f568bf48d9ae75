use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn wallet_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::get_wallet))
        .route("/transactions", get(handlers::list_transactions))
        .route("/topup", post(handlers::start_topup))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Gateway callbacks; no user session.
pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/webhook", post(handlers::payment_webhook))
        .with_state(state)
}
