use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::auth_routes;
use shared_utils::test_utils::{
    JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET,
};

fn create_test_app(server_uri: &str) -> Router {
    auth_routes(TestConfig::with_mock_server(server_uri).to_arc())
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn mount_rows(server: &MockServer, table: &str, column: &str, user_id: &str, rows: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param(column, format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_validate_token_endpoint() {
    let server = MockServer::start().await;
    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(24));

    let response = create_test_app(&server.uri())
        .oneshot(bearer_request("POST", "/validate", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["user_id"], user.id);
    assert_eq!(body["email"], user.email);
}

#[tokio::test]
async fn test_validate_token_endpoint_unauthorized() {
    let server = MockServer::start().await;

    let response = create_test_app(&server.uri())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/validate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verify_token_endpoint_invalid() {
    let server = MockServer::start().await;
    let token = JwtTestUtils::create_invalid_signature_token(&TestUser::default());

    let response = create_test_app(&server.uri())
        .oneshot(bearer_request("POST", "/verify", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "valid": false }));
}

#[tokio::test]
async fn test_me_for_clinic_owner() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(24));
    let clinic_id = Uuid::new_v4().to_string();

    mount_rows(
        &server,
        "clinics",
        "owner_id",
        &owner.id,
        json!([MockSupabaseResponses::clinic_response(&clinic_id, &owner.id)]),
    )
    .await;

    let response = create_test_app(&server.uri())
        .oneshot(bearer_request("GET", "/me", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["id"], owner.id);
    assert_eq!(body["clinic"]["clinic_id"], clinic_id);
    assert_eq!(body["clinic"]["role"], "owner");
}

#[tokio::test]
async fn test_me_for_secretary_lists_permissions() {
    let server = MockServer::start().await;
    let secretary = TestUser::secretary("secretary@example.com");
    let token = JwtTestUtils::create_test_token(&secretary, TEST_JWT_SECRET, Some(24));
    let clinic_id = Uuid::new_v4().to_string();

    mount_rows(&server, "clinics", "owner_id", &secretary.id, json!([])).await;
    mount_rows(
        &server,
        "secretaries",
        "user_id",
        &secretary.id,
        json!([MockSupabaseResponses::secretary_response(
            &clinic_id,
            &secretary.id,
            &["view_patients", "manage_appointments"],
        )]),
    )
    .await;

    let response = create_test_app(&server.uri())
        .oneshot(bearer_request("GET", "/me", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["clinic"]["role"], "secretary");
    assert_eq!(
        body["clinic"]["permissions"],
        json!(["view_patients", "manage_appointments"])
    );
}

#[tokio::test]
async fn test_me_without_clinic() {
    let server = MockServer::start().await;
    let user = TestUser::default();
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, Some(24));

    mount_rows(&server, "clinics", "owner_id", &user.id, json!([])).await;
    mount_rows(&server, "secretaries", "user_id", &user.id, json!([])).await;

    let response = create_test_app(&server.uri())
        .oneshot(bearer_request("GET", "/me", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["clinic"], Value::Null);
}

#[tokio::test]
async fn test_me_requires_token() {
    let server = MockServer::start().await;

    let response = create_test_app(&server.uri())
        .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
