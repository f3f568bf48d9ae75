use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use clinic_cell::{ClinicAccess, ClinicAccessService, Permission};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreatePatientRequest, CreateVisitRequest, PatientSearchQuery, UpdatePatientRequest};
use crate::services::{PatientService, VisitService};

async fn require(
    config: &AppConfig,
    user: &User,
    token: &str,
    permission: Permission,
) -> Result<ClinicAccess, AppError> {
    Ok(ClinicAccessService::new(config)
        .require(user, token, permission)
        .await?)
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ManagePatients).await?;
    let patient = PatientService::new(&config)
        .create_patient(access.clinic_id, request, Some(auth.token()))
        .await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ViewPatients).await?;
    let patient = PatientService::new(&config)
        .get_patient(access.clinic_id, patient_id, Some(auth.token()))
        .await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ManagePatients).await?;
    let patient = PatientService::new(&config)
        .update_patient(access.clinic_id, patient_id, request, auth.token())
        .await?;
    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ManagePatients).await?;
    PatientService::new(&config)
        .delete_patient(access.clinic_id, patient_id, auth.token())
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Patient deleted"
    })))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ViewPatients).await?;
    let patients = PatientService::new(&config)
        .search_patients(access.clinic_id, &query, auth.token())
        .await?;
    let (limit, offset) = query.page();

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len(),
        "limit": limit,
        "offset": offset
    })))
}

#[axum::debug_handler]
pub async fn list_visits(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ViewPatients).await?;
    let visits = VisitService::new(&config)
        .list_visits(access.clinic_id, patient_id, auth.token())
        .await?;

    Ok(Json(json!({
        "visits": visits,
        "total": visits.len()
    })))
}

#[axum::debug_handler]
pub async fn create_visit(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<CreateVisitRequest>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ManagePatients).await?;
    let visit = VisitService::new(&config)
        .create_visit(access.clinic_id, patient_id, request, auth.token())
        .await?;
    Ok(Json(json!(visit)))
}
