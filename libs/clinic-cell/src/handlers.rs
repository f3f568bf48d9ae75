use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AddSecretaryRequest, CreateClinicRequest, Permission, UpdateClinicRequest,
    UpdateSecretaryRequest,
};
use crate::services::{access::ClinicAccessService, clinic::ClinicService, staff::StaffService};

#[axum::debug_handler]
pub async fn create_clinic(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateClinicRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&config);
    let clinic = service.create_clinic(&user, request, auth.token()).await?;
    Ok(Json(json!(clinic)))
}

#[axum::debug_handler]
pub async fn get_my_clinic(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .resolve(&user, auth.token())
        .await?;
    let clinic = ClinicService::new(&config)
        .get_clinic(access.clinic_id, auth.token())
        .await?;

    Ok(Json(json!({
        "clinic": clinic,
        "access": access
    })))
}

#[axum::debug_handler]
pub async fn update_my_clinic(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateClinicRequest>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .require(&user, auth.token(), Permission::ManageSettings)
        .await?;
    let clinic = ClinicService::new(&config)
        .update_clinic(access.clinic_id, request, auth.token())
        .await?;
    Ok(Json(json!(clinic)))
}

#[axum::debug_handler]
pub async fn list_secretaries(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .resolve(&user, auth.token())
        .await?;
    access.require_owner()?;

    let secretaries = StaffService::new(&config)
        .list_secretaries(access.clinic_id, auth.token())
        .await?;

    Ok(Json(json!({
        "secretaries": secretaries,
        "total": secretaries.len()
    })))
}

#[axum::debug_handler]
pub async fn add_secretary(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AddSecretaryRequest>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .resolve(&user, auth.token())
        .await?;
    access.require_owner()?;

    info!("Owner {} adding secretary {}", user.id, request.email);
    let secretary = StaffService::new(&config)
        .add_secretary(access.clinic_id, request, auth.token())
        .await?;
    Ok(Json(json!(secretary)))
}

#[axum::debug_handler]
pub async fn update_secretary(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(secretary_id): Path<Uuid>,
    Json(request): Json<UpdateSecretaryRequest>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .resolve(&user, auth.token())
        .await?;
    access.require_owner()?;

    let secretary = StaffService::new(&config)
        .update_secretary(access.clinic_id, secretary_id, request, auth.token())
        .await?;
    Ok(Json(json!(secretary)))
}

#[axum::debug_handler]
pub async fn remove_secretary(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(secretary_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .resolve(&user, auth.token())
        .await?;
    access.require_owner()?;

    StaffService::new(&config)
        .remove_secretary(access.clinic_id, secretary_id, auth.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Secretary removed"
    })))
}
