use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use appointment_cell::router::{appointment_routes, booking_routes};
use assistant_cell::router::assistant_routes;
use auth_cell::router::auth_routes;
use clinic_cell::router::clinic_routes;
use marketplace_cell::router::marketplace_routes;
use medical_fields_cell::router::medical_fields_routes;
use notification_cell::router::notification_routes;
use offline_queue_cell::router::offline_queue_routes;
use offline_queue_cell::QueueStore;
use patient_cell::router::patient_routes;
use payment_cell::router::{payment_routes, wallet_routes};
use shared_config::AppConfig;

async fn health(State(config): State<Arc<AppConfig>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tabibi-api",
        "capabilities": {
            "database": config.is_configured(),
            "payments": config.is_payment_configured(),
            "push": config.is_push_configured(),
            "whatsapp": config.is_whatsapp_configured(),
            "ai": config.is_ai_configured(),
            "redis_queue": config.redis_url.is_some(),
        }
    }))
}

pub fn create_router(state: Arc<AppConfig>, store: Arc<dyn QueueStore>) -> Router {
    Router::new()
        .route("/", get(|| async { "Tabibi API is running!" }))
        .route("/health", get(health).with_state(state.clone()))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/clinics", clinic_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/booking", booking_routes(state.clone()))
        .nest("/medical-fields", medical_fields_routes(state.clone()))
        .nest("/wallet", wallet_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
        .nest("/marketplace", marketplace_routes(state.clone()))
        .nest("/notifications", notification_routes(state.clone()))
        .nest("/assistant", assistant_routes(state.clone()))
        .nest("/sync", offline_queue_routes(state, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use offline_queue_cell::MemoryQueueStore;
    use shared_utils::test_utils::TestConfig;
    use tower::ServiceExt;

    fn app() -> Router {
        create_router(TestConfig::default().to_arc(), Arc::new(MemoryQueueStore::new()))
    }

    #[tokio::test]
    async fn health_reports_capabilities() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["capabilities"]["payments"], true);
        assert_eq!(json["capabilities"]["redis_queue"], false);
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let response = app()
            .oneshot(Request::builder().uri("/wallet").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
