use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use medical_fields_cell::medical_fields_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

fn app_for(server: &MockServer) -> Router {
    medical_fields_routes(TestConfig::with_mock_server(&server.uri()).to_arc())
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn mount_owner(server: &MockServer, user_id: &str, clinic_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("owner_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": clinic_id }])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_config_normalizes_stored_value() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();

    mount_owner(&server, &owner.id, &clinic_id).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "medical_fields_config": {
                "sections_order": ["notes", "notes", "ghost"],
                "sections": { "vitals": { "enabled": false } }
            }
        }])))
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .uri("/")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["sections_order"],
        json!(["notes", "vitals", "complaint", "diagnosis", "treatment"])
    );
    assert_eq!(body["sections"]["vitals"]["enabled"], false);
    assert_eq!(body["sections"]["vitals"]["fields"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_save_config_persists_normalized_form() {
    let server = MockServer::start().await;
    let owner = TestUser::doctor("owner@tabibi.app");
    let token = JwtTestUtils::create_test_token(&owner, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();

    mount_owner(&server, &owner.id, &clinic_id).await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("id", format!("eq.{}", clinic_id)))
        .and(body_partial_json(json!({
            "medical_fields_config": { "custom_sections": [{ "id": "custom_1", "title": "Dental" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::clinic_response(&clinic_id, &owner.id)
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/")
                .header("authorization", format!("Bearer {}", token))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "custom_sections": [{ "title": "Dental", "fields": [] }] }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sections_order"].as_array().unwrap().last().unwrap(), "custom_1");
}

#[tokio::test]
async fn test_secretary_cannot_reset_config() {
    let server = MockServer::start().await;
    let secretary = TestUser::secretary("sara@example.com");
    let token = JwtTestUtils::create_test_token(&secretary, TEST_JWT_SECRET, Some(1));
    let clinic_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clinics"))
        .and(query_param("owner_id", format!("eq.{}", secretary.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/secretaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::secretary_response(&clinic_id, &secretary.id, &["manage_patients"])
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reset")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
