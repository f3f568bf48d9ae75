use std::sync::Arc;

use axum::{
    extract::{Extension, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Duration, Local};
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use clinic_cell::{ClinicAccess, ClinicAccessService, Permission};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::verify_webhook_secret;

use crate::models::{DatabaseWebhook, ReminderQuery};
use crate::services::{InstanceService, PushService, ReminderService};

#[axum::debug_handler]
pub async fn push_webhook(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    verify_webhook_secret(&headers, &config.webhook_secret)?;

    let webhook: DatabaseWebhook = serde_json::from_value(payload)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;
    let outcome = PushService::new(&config).dispatch(webhook).await?;
    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn send_reminders(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    Query(query): Query<ReminderQuery>,
) -> Result<Json<Value>, AppError> {
    verify_webhook_secret(&headers, &config.webhook_secret)?;

    let date = query
        .date
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(1));
    let report = ReminderService::new(&config).send_reminders(date).await?;
    Ok(Json(json!(report)))
}

async fn settings_access(config: &AppConfig, user: &User, token: &str) -> Result<ClinicAccess, AppError> {
    Ok(ClinicAccessService::new(config)
        .require(user, token, Permission::ManageSettings)
        .await?)
}

#[axum::debug_handler]
pub async fn create_instance(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = settings_access(&config, &user, auth.token()).await?;
    let instance = InstanceService::new(&config)?
        .create(access.clinic_id, auth.token())
        .await?;
    Ok(Json(json!(instance)))
}

#[axum::debug_handler]
pub async fn instance_qr(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = settings_access(&config, &user, auth.token()).await?;
    let qr = InstanceService::new(&config)?
        .qr_code(access.clinic_id, auth.token())
        .await?;
    Ok(Json(qr))
}

#[axum::debug_handler]
pub async fn instance_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = settings_access(&config, &user, auth.token()).await?;
    let instance = InstanceService::new(&config)?
        .refresh_status(access.clinic_id, auth.token())
        .await?;
    Ok(Json(json!(instance)))
}

#[axum::debug_handler]
pub async fn logout_instance(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = settings_access(&config, &user, auth.token()).await?;
    let instance = InstanceService::new(&config)?
        .logout(access.clinic_id, auth.token())
        .await?;
    Ok(Json(json!(instance)))
}

#[axum::debug_handler]
pub async fn delete_instance(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = settings_access(&config, &user, auth.token()).await?;
    InstanceService::new(&config)?
        .delete(access.clinic_id, auth.token())
        .await?;
    Ok(Json(json!({ "deleted": true })))
}
