use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use clinic_cell::ClinicAccessService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::ChatRequest;
use crate::services::{AssistantService, ConversationService};

#[axum::debug_handler]
pub async fn chat(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config).resolve(&user, auth.token()).await?;
    let response = AssistantService::new(&config)
        .chat(&access, &request, Utc::now(), auth.token())
        .await?;
    Ok(Json(json!(response)))
}

#[axum::debug_handler]
pub async fn list_conversations(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config).resolve(&user, auth.token()).await?;
    let conversations = ConversationService::new(&config)
        .list(access.clinic_id, &user.id, auth.token())
        .await?;
    Ok(Json(json!(conversations)))
}

#[axum::debug_handler]
pub async fn get_conversation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config).resolve(&user, auth.token()).await?;
    let detail = ConversationService::new(&config)
        .detail(conversation_id, access.clinic_id, &user.id, auth.token())
        .await?;
    Ok(Json(json!(detail)))
}

#[axum::debug_handler]
pub async fn delete_conversation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config).resolve(&user, auth.token()).await?;
    ConversationService::new(&config)
        .delete(conversation_id, access.clinic_id, &user.id, auth.token())
        .await?;
    Ok(Json(json!({ "deleted": true })))
}
