use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use marketplace_cell::marketplace_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

fn app_for(server: &MockServer) -> Router {
    marketplace_routes(TestConfig::with_mock_server(&server.uri()).to_arc())
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn mount_owner(server: &MockServer, user_id: &str, clinic_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("owner_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": clinic_id }])))
        .mount(server)
        .await;
}

async fn mount_app(server: &MockServer, app_id: &str, price: f64) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/marketplace_apps"))
        .and(query_param("key", "eq.ai_assistant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::marketplace_app_response(app_id, "ai_assistant", price)
        ])))
        .mount(server)
        .await;
}

fn in_days(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

#[tokio::test]
async fn test_subscribe_debits_wallet_and_activates() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();
    let app_id = Uuid::new_v4().to_string();
    let subscription_id = Uuid::new_v4().to_string();

    mount_owner(&server, &owner.id, &clinic_id).await;
    mount_app(&server, &app_id, 99.0).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/app_subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/wallets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::wallet_response(&clinic_id, 150.0)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/debit_wallet"))
        .and(body_partial_json(json!({ "p_clinic_id": clinic_id, "p_amount": 99.0 })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/wallet_transactions"))
        .and(body_partial_json(json!({ "type": "debit", "status": "completed", "amount": 99.0 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "clinic_id": clinic_id,
            "amount": 99.0,
            "type": "debit",
            "status": "completed",
            "reference": Uuid::new_v4(),
            "easykash_ref": null,
            "description": "Subscription: AI Assistant",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/app_subscriptions"))
        .and(body_partial_json(json!({ "clinic_id": clinic_id, "app_key": "ai_assistant", "status": "active" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::subscription_response(
                &subscription_id, &clinic_id, &app_id, "ai_assistant", "active", &in_days(30)
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(authed("POST", "/apps/ai_assistant/subscribe", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], subscription_id);
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn test_subscribe_with_insufficient_balance_is_payment_required() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();

    mount_owner(&server, &owner.id, &clinic_id).await;
    mount_app(&server, &Uuid::new_v4().to_string(), 99.0).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/app_subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/wallets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::wallet_response(&clinic_id, 20.0)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/debit_wallet"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/app_subscriptions"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(authed("POST", "/apps/ai_assistant/subscribe", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_subscribe_twice_is_conflict() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();
    let app_id = Uuid::new_v4().to_string();

    mount_owner(&server, &owner.id, &clinic_id).await;
    mount_app(&server, &app_id, 99.0).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/app_subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::subscription_response(
                &Uuid::new_v4().to_string(), &clinic_id, &app_id, "ai_assistant", "active", &in_days(12)
            )
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/debit_wallet"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(authed("POST", "/apps/ai_assistant/subscribe", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_secretary_cannot_subscribe() {
    let server = MockServer::start().await;
    let secretary = TestUser::secretary("sara@example.com");
    let token = JwtTestUtils::create_test_token(&secretary, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/secretaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::secretary_response(&clinic_id, &secretary.id, &["view_finance", "manage_settings"])
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/marketplace_apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(authed("POST", "/apps/ai_assistant/subscribe", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_cancelled_subscription_no_longer_grants_access() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();
    let app_id = Uuid::new_v4().to_string();
    let subscription_id = Uuid::new_v4().to_string();
    let expires_at = in_days(20);

    let active = MockSupabaseResponses::subscription_response(
        &subscription_id, &clinic_id, &app_id, "ai_assistant", "active", &expires_at,
    );
    let mut cancelled = MockSupabaseResponses::subscription_response(
        &subscription_id, &clinic_id, &app_id, "ai_assistant", "cancelled", &expires_at,
    );
    cancelled["cancelled_at"] = json!(Utc::now().to_rfc3339());

    mount_owner(&server, &owner.id, &clinic_id).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/app_subscriptions"))
        .and(query_param("id", format!("eq.{}", subscription_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([active])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/app_subscriptions"))
        .and(query_param("status", "eq.active"))
        .and(body_partial_json(json!({ "status": "cancelled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled.clone()])))
        .expect(1)
        .mount(&server)
        .await;
    // Even if a stale row slips past the status filter, it must not grant access.
    Mock::given(method("GET"))
        .and(path("/rest/v1/app_subscriptions"))
        .and(query_param("app_key", "eq.ai_assistant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&server)
        .await;

    let app = app_for(&server);
    let response = app
        .clone()
        .oneshot(authed("POST", &format!("/subscriptions/{}/cancel", subscription_id), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");

    let response = app
        .oneshot(authed("GET", "/apps/ai_assistant/access", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "app_key": "ai_assistant", "has_access": false })
    );
}

#[tokio::test]
async fn test_active_subscription_grants_access() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();

    mount_owner(&server, &owner.id, &clinic_id).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/app_subscriptions"))
        .and(query_param("status", "eq.active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::subscription_response(
                &Uuid::new_v4().to_string(), &clinic_id, &Uuid::new_v4().to_string(), "ai_assistant", "active", &in_days(5)
            )
        ])))
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(authed("GET", "/apps/ai_assistant/access", &token))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["has_access"], true);
}
