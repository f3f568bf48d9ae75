use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn notification_routes(state: Arc<AppConfig>) -> Router {
    // Called by database webhooks and cron; authenticated by shared secret.
    let webhooks = Router::new()
        .route("/push-webhook", post(handlers::push_webhook))
        .route("/whatsapp/reminders", post(handlers::send_reminders));

    let instance = Router::new()
        .route(
            "/whatsapp/instance",
            post(handlers::create_instance).delete(handlers::delete_instance),
        )
        .route("/whatsapp/instance/qr", get(handlers::instance_qr))
        .route("/whatsapp/instance/status", get(handlers::instance_status))
        .route("/whatsapp/instance/logout", post(handlers::logout_instance))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    webhooks.merge(instance).with_state(state)
}
