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

use crate::models::AccessResponse;
use crate::services::MarketplaceService;

#[axum::debug_handler]
pub async fn list_apps(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let apps = MarketplaceService::new(&config).list_apps(auth.token()).await?;
    Ok(Json(json!(apps)))
}

#[axum::debug_handler]
pub async fn list_subscriptions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config).resolve(&user, auth.token()).await?;
    let subscriptions = MarketplaceService::new(&config)
        .list_subscriptions(access.clinic_id, auth.token())
        .await?;
    Ok(Json(json!(subscriptions)))
}

#[axum::debug_handler]
pub async fn subscribe(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(app_key): Path<String>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config).resolve(&user, auth.token()).await?;
    let subscription = MarketplaceService::new(&config)
        .subscribe(&access, &app_key, Utc::now(), auth.token())
        .await?;
    Ok(Json(json!(subscription)))
}

#[axum::debug_handler]
pub async fn cancel_subscription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(subscription_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config).resolve(&user, auth.token()).await?;
    access.require_owner()?;
    let subscription = MarketplaceService::new(&config)
        .cancel(access.clinic_id, subscription_id, Utc::now(), auth.token())
        .await?;
    Ok(Json(json!(subscription)))
}

#[axum::debug_handler]
pub async fn check_access(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(app_key): Path<String>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config).resolve(&user, auth.token()).await?;
    let has_access = MarketplaceService::new(&config)
        .has_access(access.clinic_id, &app_key, Utc::now(), auth.token())
        .await?;
    Ok(Json(json!(AccessResponse { app_key, has_access })))
}
