use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use offline_queue_cell::models::{EntityKind, Operation};
use offline_queue_cell::{offline_queue_routes, MemoryQueueStore, QueueStore, QueuedMutation};
use shared_utils::test_utils::{
    JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET,
};

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn app(server: &MockServer, store: Arc<dyn QueueStore>) -> Router {
    offline_queue_routes(TestConfig::with_mock_server(&server.uri()).to_arc(), store)
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("content-type", "application/json");
    match body {
        Some(body) => builder.body(Body::from(body.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_enqueue_requires_auth() {
    let server = MockServer::start().await;
    let response = app(&server, Arc::new(MemoryQueueStore::new()))
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/queue")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_mutation_rejects_whole_batch() {
    let server = MockServer::start().await;
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));

    let batch = json!({
        "mutations": [
            { "entity": "patient", "operation": "create", "payload": { "full_name": "Mona Adel" } },
            { "entity": "appointment", "operation": "delete" }
        ]
    });
    let response = app(&server, store.clone())
        .oneshot(authed("POST", "/queue", &token, Some(batch)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("mutation 1"));
    assert!(store.list(&user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replay_applies_mutations_in_order() {
    let server = MockServer::start().await;
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, &clinic_id, "Mona Adel")
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id,
                &clinic_id,
                &patient_id,
                "2026-11-02",
                "10:00:00",
                "confirmed",
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let router = app(&server, store.clone());
    let batch = json!({
        "mutations": [
            { "entity": "patient", "operation": "create", "payload": { "full_name": "Mona Adel", "phone": "01001234567" } },
            { "entity": "appointment", "operation": "update", "record_id": appointment_id, "payload": { "status": "confirmed" } }
        ]
    });
    let response = router
        .clone()
        .oneshot(authed("POST", "/queue", &token, Some(batch)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["queued"], 2);

    let response = router
        .clone()
        .oneshot(authed("POST", "/replay", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "replayed": 2, "failed": 0, "remaining": 0, "dead_lettered": 0 })
    );

    let requests = server.received_requests().await.unwrap();
    let order: Vec<&str> = requests.iter().map(|r| r.url.path()).collect();
    assert_eq!(order, vec!["/rest/v1/patients", "/rest/v1/appointments"]);
    assert!(store.list(&user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replay_stops_at_first_failure() {
    let server = MockServer::start().await;
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("upstream down", "XX000"),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let router = app(&server, store.clone());
    let batch = json!({
        "mutations": [
            { "entity": "patient", "operation": "create", "payload": { "full_name": "Mona Adel" } },
            { "entity": "visit", "operation": "delete", "record_id": Uuid::new_v4() }
        ]
    });
    router
        .clone()
        .oneshot(authed("POST", "/queue", &token, Some(batch)))
        .await
        .unwrap();

    let response = router
        .clone()
        .oneshot(authed("POST", "/replay", &token, None))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({ "replayed": 0, "failed": 1, "remaining": 2, "dead_lettered": 0 })
    );

    let response = router
        .oneshot(authed("GET", "/queue", &token, None))
        .await
        .unwrap();
    let pending = body_json(response).await;
    assert_eq!(pending[0]["attempts"], 1);
    assert!(pending[0]["last_error"].is_string());
    assert_eq!(pending[1]["attempts"], 0);
}

#[tokio::test]
async fn test_exhausted_mutation_is_dead_lettered_and_replay_continues() {
    let server = MockServer::start().await;
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(1));
    let visit_id = Uuid::new_v4();

    store
        .push(&QueuedMutation {
            id: Uuid::new_v4(),
            owner: user.id.clone(),
            entity: EntityKind::Patient,
            operation: Operation::Create,
            record_id: None,
            payload: Some(json!({ "full_name": "Mona Adel" })),
            queued_at: Utc::now(),
            attempts: 4,
            last_error: Some("previous failure".to_string()),
        })
        .await
        .unwrap();
    store
        .push(&QueuedMutation {
            id: Uuid::new_v4(),
            owner: user.id.clone(),
            entity: EntityKind::Visit,
            operation: Operation::Delete,
            record_id: Some(visit_id),
            payload: None,
            queued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        })
        .await
        .unwrap();

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("still down", "XX000"),
        ))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", visit_id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let router = app(&server, store.clone());
    let response = router
        .clone()
        .oneshot(authed("POST", "/replay", &token, None))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({ "replayed": 1, "failed": 1, "remaining": 0, "dead_lettered": 1 })
    );

    let response = router
        .oneshot(authed("GET", "/dead-letter", &token, None))
        .await
        .unwrap();
    let dead = body_json(response).await;
    assert_eq!(dead.as_array().unwrap().len(), 1);
    assert_eq!(dead[0]["attempts"], 5);
    assert_eq!(dead[0]["entity"], "patient");
}

#[tokio::test]
async fn test_queues_are_isolated_per_user() {
    let server = MockServer::start().await;
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
    let doctor = TestUser::doctor("doctor@example.com");
    let secretary = TestUser::secretary("secretary@example.com");

    let router = app(&server, store);
    let batch = json!({
        "mutations": [
            { "entity": "patient", "operation": "update", "record_id": Uuid::new_v4(), "payload": { "notes": "x" } }
        ]
    });
    router
        .clone()
        .oneshot(authed(
            "POST",
            "/queue",
            &JwtTestUtils::create_test_token(&doctor, TEST_JWT_SECRET, Some(1)),
            Some(batch),
        ))
        .await
        .unwrap();

    let response = router
        .oneshot(authed(
            "GET",
            "/queue",
            &JwtTestUtils::create_test_token(&secretary, TEST_JWT_SECRET, Some(1)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!([]));
}
