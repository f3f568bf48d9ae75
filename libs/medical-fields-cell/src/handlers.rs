use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::info;

use clinic_cell::{ClinicAccessService, ClinicService, Permission};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::services::normalizer::{default_config, normalize};

/// Any staff member may read the form layout; it drives the visit editor.
#[axum::debug_handler]
pub async fn get_config(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .resolve(&user, auth.token())
        .await?;
    let raw = ClinicService::new(&config)
        .get_medical_fields_config(access.clinic_id, auth.token())
        .await?;

    Ok(Json(json!(normalize(&raw))))
}

#[axum::debug_handler]
pub async fn save_config(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .require(&user, auth.token(), Permission::ManageSettings)
        .await?;

    let normalized = normalize(&request);
    ClinicService::new(&config)
        .save_medical_fields_config(access.clinic_id, json!(normalized), auth.token())
        .await?;

    info!("Medical fields config updated for clinic {}", access.clinic_id);
    Ok(Json(json!(normalized)))
}

#[axum::debug_handler]
pub async fn reset_config(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let access = ClinicAccessService::new(&config)
        .require(&user, auth.token(), Permission::ManageSettings)
        .await?;

    let defaults = default_config();
    ClinicService::new(&config)
        .save_medical_fields_config(access.clinic_id, json!(defaults), auth.token())
        .await?;

    info!("Medical fields config reset for clinic {}", access.clinic_id);
    Ok(Json(json!(defaults)))
}
