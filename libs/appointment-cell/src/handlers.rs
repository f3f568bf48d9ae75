use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Local;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use clinic_cell::{ClinicAccess, ClinicAccessService, Permission};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentQuery, AvailabilityQuery, CreateAppointmentRequest, PublicBookingRequest,
    RescheduleRequest, UpdateStatusRequest,
};
use crate::services::{AppointmentService, PublicBookingService};

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

// ==============================================================================
// STAFF ENDPOINTS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ManageAppointments).await?;
    let appointment = AppointmentService::new(&config)
        .create_appointment(access.clinic_id, request, Local::now().date_naive(), auth.token())
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ViewAppointments).await?;
    let appointment = AppointmentService::new(&config)
        .get_appointment(access.clinic_id, appointment_id, auth.token())
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ViewAppointments).await?;
    let appointments = AppointmentService::new(&config)
        .list_appointments(access.clinic_id, &query, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn today_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ViewAppointments).await?;
    let today = Local::now().date_naive();
    let appointments = AppointmentService::new(&config)
        .today(access.clinic_id, today, auth.token())
        .await?;

    Ok(Json(json!({
        "date": today,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn update_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ManageAppointments).await?;
    let appointment = AppointmentService::new(&config)
        .update_status(access.clinic_id, appointment_id, request.status, auth.token())
        .await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let access = require(&config, &user, auth.token(), Permission::ManageAppointments).await?;
    let appointment = AppointmentService::new(&config)
        .reschedule(
            access.clinic_id,
            appointment_id,
            request,
            Local::now().date_naive(),
            auth.token(),
        )
        .await?;
    Ok(Json(json!(appointment)))
}

// ==============================================================================
// PUBLIC BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn booking_availability(
    State(config): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let availability = PublicBookingService::new(&config)
        .availability(&slug, query.date, Local::now().naive_local())
        .await?;
    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn book_online(
    State(config): State<Arc<AppConfig>>,
    Path(slug): Path<String>,
    Json(request): Json<PublicBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let confirmation = PublicBookingService::new(&config)
        .book(&slug, request, Local::now().naive_local())
        .await?;
    Ok(Json(json!(confirmation)))
}
