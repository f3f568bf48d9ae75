use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn medical_fields_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::get_config).put(handlers::save_config))
        .route("/reset", post(handlers::reset_config))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
