use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn clinic_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_clinic))
        .route("/me", get(handlers::get_my_clinic).put(handlers::update_my_clinic))
        .route(
            "/me/secretaries",
            get(handlers::list_secretaries).post(handlers::add_secretary),
        )
        .route(
            "/me/secretaries/{secretary_id}",
            put(handlers::update_secretary).delete(handlers::remove_secretary),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
