use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::QueueStore;

#[derive(Clone)]
pub struct QueueState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn QueueStore>,
}

pub fn offline_queue_routes(config: Arc<AppConfig>, store: Arc<dyn QueueStore>) -> Router {
    let state = QueueState {
        config: config.clone(),
        store,
    };

    Router::new()
        .route("/queue", post(handlers::enqueue).get(handlers::list_pending))
        .route("/replay", post(handlers::replay))
        .route("/dead-letter", get(handlers::list_dead_letters))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
