use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn marketplace_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/apps", get(handlers::list_apps))
        .route("/apps/{app_key}/subscribe", post(handlers::subscribe))
        .route("/apps/{app_key}/access", get(handlers::check_access))
        .route("/subscriptions", get(handlers::list_subscriptions))
        .route("/subscriptions/{subscription_id}/cancel", post(handlers::cancel_subscription))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
