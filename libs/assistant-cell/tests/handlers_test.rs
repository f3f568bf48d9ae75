use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assistant_cell::assistant_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

const GEMINI_PATH: &str = "/v1beta/models/gemini-test:generateContent";

fn app_for(server: &MockServer) -> Router {
    assistant_routes(TestConfig::with_mock_server(&server.uri()).to_arc())
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn chat_request(token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn mount_clinic(server: &MockServer, owner_id: &str, clinic_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("owner_id", format!("eq.{}", owner_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": clinic_id }])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_response(clinic_id, owner_id)
        ])))
        .mount(server)
        .await;
}

async fn mount_subscription(server: &MockServer, clinic_id: &str, status: &str) {
    let expires_at = (Utc::now() + Duration::days(10)).to_rfc3339();
    Mock::given(method("GET"))
        .and(path("/rest/v1/app_subscriptions"))
        .and(query_param("app_key", "eq.ai_assistant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::subscription_response(
                &Uuid::new_v4().to_string(), clinic_id, &Uuid::new_v4().to_string(), "ai_assistant", status, &expires_at
            )
        ])))
        .mount(server)
        .await;
}

async fn mount_context(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }, { "id": Uuid::new_v4() }])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(server)
        .await;
}

fn conversation_row(conversation_id: &str, clinic_id: &str, user_id: &str) -> Value {
    json!({
        "id": conversation_id,
        "clinic_id": clinic_id,
        "user_id": user_id,
        "title": "Follow-up scheduling",
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": "2026-01-01T00:00:00Z"
    })
}

fn message_row(conversation_id: &str, role: &str, content: &str, created_at: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "conversation_id": conversation_id,
        "role": role,
        "content": content,
        "created_at": created_at
    })
}

async fn mount_exchange_storage(server: &MockServer, conversation_id: &str, clinic_id: &str, user_id: &str) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/ai_messages"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            message_row(conversation_id, "user", "q", "2026-01-01T00:00:00Z"),
            message_row(conversation_id, "assistant", "a", "2026-01-01T00:00:01Z")
        ])))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/ai_conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            conversation_row(conversation_id, clinic_id, user_id)
        ])))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_chat_without_subscription_is_payment_required() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();

    mount_clinic(&server, &owner.id, &clinic_id).await;
    mount_subscription(&server, &clinic_id, "cancelled").await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(chat_request(&token, json!({ "message": "Hello" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));

    mount_clinic(&server, &owner.id, &Uuid::new_v4().to_string()).await;

    let response = app_for(&server)
        .oneshot(chat_request(&token, json!({ "message": "   " })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_first_message_starts_conversation() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();
    let conversation_id = Uuid::new_v4().to_string();

    mount_clinic(&server, &owner.id, &clinic_id).await;
    mount_subscription(&server, &clinic_id, "active").await;
    mount_context(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/ai_conversations"))
        .and(body_partial_json(json!({ "clinic_id": clinic_id, "user_id": owner.id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            conversation_row(&conversation_id, &clinic_id, &owner.id)
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "test-gemini-key"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "How many patients today?" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": "You have 2 appointments today." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_exchange_storage(&server, &conversation_id, &clinic_id, &owner.id).await;

    let response = app_for(&server)
        .oneshot(chat_request(&token, json!({ "message": "How many patients today?" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["conversation_id"], conversation_id);
    assert_eq!(body["reply"], "You have 2 appointments today.");
}

#[tokio::test]
async fn test_follow_up_sends_history_oldest_first() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();
    let conversation_id = Uuid::new_v4().to_string();

    mount_clinic(&server, &owner.id, &clinic_id).await;
    mount_subscription(&server, &clinic_id, "active").await;
    mount_context(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/ai_conversations"))
        .and(query_param("id", format!("eq.{}", conversation_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            conversation_row(&conversation_id, &clinic_id, &owner.id)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/ai_messages"))
        .and(query_param("order", "created_at.desc"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            message_row(&conversation_id, "assistant", "Thursday has free slots.", "2026-01-01T10:00:01Z"),
            message_row(&conversation_id, "user", "When can I book a follow-up?", "2026-01-01T10:00:00Z")
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(body_partial_json(json!({
            "contents": [
                { "role": "user", "parts": [{ "text": "When can I book a follow-up?" }] },
                { "role": "model", "parts": [{ "text": "Thursday has free slots." }] },
                { "role": "user", "parts": [{ "text": "And Saturday?" }] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Saturday 10:00 to 14:00." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_exchange_storage(&server, &conversation_id, &clinic_id, &owner.id).await;

    let response = app_for(&server)
        .oneshot(chat_request(
            &token,
            json!({ "message": "And Saturday?", "conversation_id": conversation_id }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["reply"], "Saturday 10:00 to 14:00.");
}

#[tokio::test]
async fn test_unknown_conversation_is_not_found() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();

    mount_clinic(&server, &owner.id, &clinic_id).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/ai_conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .uri(format!("/conversations/{}", Uuid::new_v4()))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
